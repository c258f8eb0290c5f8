//! Persistence seam for the translation memory.
//!
//! A store hands out the memory together with a [`VersionToken`] and only
//! accepts a write that presents the token of the version it replaces.

use crate::memory::TranslationMemory;
use async_trait::async_trait;
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("translation memory not found at {0}")]
    NotFound(String),
    #[error("could not decode translation memory: {0}")]
    DecodeError(String),
    #[error("could not encode translation memory: {0}")]
    EncodeError(String),
    #[error("translation memory was changed by someone else since it was loaded")]
    Conflict,
    #[error("storage request failed: {message}")]
    TransportError {
        /// HTTP status, when the failure came back as a response
        status: Option<u16>,
        message: String,
    },
}

impl StoreError {
    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::TransportError {
            status,
            message: message.into(),
        }
    }

    /// Network failures, rate limiting and 5xx responses may succeed on a second try
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TransportError { status: None, .. } => true,
            Self::TransportError {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Opaque version of the stored memory, returned by `load` and required by `save`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Fetch the current memory and its version
    async fn load(&self) -> Result<(TranslationMemory, VersionToken), StoreError>;

    /// Replace the stored memory.
    ///
    /// `version` must be the token from the `load` this write is based on, or
    /// `None` to create the memory. Either way a mismatch yields [`StoreError::Conflict`].
    async fn save(
        &self,
        memory: &TranslationMemory,
        version: Option<&VersionToken>,
    ) -> Result<(), StoreError>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Process-local store used when no repository is configured.
///
/// Keeps the encoded document so it goes through the same codec as the
/// remote store, and bumps a counter on every write.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<Option<(String, u64)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing memory at version 1
    pub fn with_memory(memory: &TranslationMemory) -> Result<Self, StoreError> {
        Ok(Self {
            state: Mutex::new(Some((memory.encode()?, 1))),
        })
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn load(&self) -> Result<(TranslationMemory, VersionToken), StoreError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.as_ref() {
            Some((content, version)) => Ok((
                TranslationMemory::decode(content)?,
                VersionToken::new(version.to_string()),
            )),
            None => Err(StoreError::NotFound(self.describe())),
        }
    }

    async fn save(
        &self,
        memory: &TranslationMemory,
        version: Option<&VersionToken>,
    ) -> Result<(), StoreError> {
        let content = memory.encode()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let next = match (state.as_ref(), version) {
            (None, None) => 1,
            (Some((_, current)), Some(token)) if token.as_str() == current.to_string() => {
                current + 1
            }
            _ => return Err(StoreError::Conflict),
        };

        *state = Some((content, next));
        Ok(())
    }

    fn describe(&self) -> String {
        "in-process memory".to_string()
    }
}
