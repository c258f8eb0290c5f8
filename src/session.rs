//! One translation request end to end: load the memory, walk the target
//! languages, emit each language's result as soon as it is ready, then
//! persist the merged memory once.

use crate::auth::Session;
use crate::languages::Language;
use crate::memory::TranslationMemory;
use crate::parser::{self, StringEntry};
use crate::reconcile::reconcile;
use crate::store::{MemoryStore, StoreError, VersionToken};
use crate::translation::Translator;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

/// How the memory looked when the run started
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MemoryStatus {
    Loaded { languages: usize, keys: usize },
    /// Nothing stored yet; the file is created on save
    Fresh,
    /// Load failed; translating without the memory and not saving
    Unavailable { error: String },
}

/// Result for one target language, in the order the languages are processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageResult {
    pub language: String,
    pub code: String,
    pub cached: usize,
    pub translated: usize,
    /// Cached and fresh translations together, sorted by key
    pub entries: Vec<StringEntry>,
    /// `entries` rendered back into `<string>` lines
    pub xml: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistOutcome {
    Saved { keys_added: usize },
    /// No new translations, nothing written
    Unchanged,
    Skipped { reason: String },
    Failed { error: String, conflict: bool },
}

/// Progress events, streamed to the browser as they happen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        keys: usize,
        languages: usize,
        memory: MemoryStatus,
    },
    Language(LanguageResult),
    Persisted(PersistOutcome),
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub memory_status: MemoryStatus,
    pub results: Vec<LanguageResult>,
    pub persist: PersistOutcome,
    /// The merged memory, whether or not it could be saved
    pub memory: TranslationMemory,
}

pub struct Orchestrator {
    store: Arc<dyn MemoryStore>,
    translator: Arc<dyn Translator>,
    languages: Vec<Language>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        translator: Arc<dyn Translator>,
        languages: &[Language],
    ) -> Self {
        Self {
            store,
            translator,
            languages: languages.to_vec(),
        }
    }

    /// Translate `entries` into every target language.
    ///
    /// Events go to `events` as they happen; a closed receiver does not stop
    /// the run, so the memory is still saved if the browser went away.
    pub async fn run(
        &self,
        session: &Session,
        entries: &[StringEntry],
        events: &UnboundedSender<SessionEvent>,
    ) -> SessionReport {
        info!(
            "Session {} ({}): translating {} strings into {} languages",
            session.id,
            session.username,
            entries.len(),
            self.languages.len()
        );

        let (mut memory, version, memory_status) = self.load_memory().await;
        emit(
            events,
            SessionEvent::Started {
                keys: entries.len(),
                languages: self.languages.len(),
                memory: memory_status.clone(),
            },
        );

        let mut results = Vec::with_capacity(self.languages.len());
        let mut keys_added = 0;

        for language in &self.languages {
            let (result, added) = self.process_language(language, entries, &mut memory).await;
            keys_added += added;
            emit(events, SessionEvent::Language(result.clone()));
            results.push(result);
        }

        let persist = self
            .persist(&memory, version.as_ref(), &memory_status, keys_added)
            .await;
        emit(events, SessionEvent::Persisted(persist.clone()));

        SessionReport {
            memory_status,
            results,
            persist,
            memory,
        }
    }

    async fn load_memory(&self) -> (TranslationMemory, Option<VersionToken>, MemoryStatus) {
        match self.store.load().await {
            Ok((memory, version)) => {
                let status = MemoryStatus::Loaded {
                    languages: memory.language_count(),
                    keys: memory.key_count(),
                };
                (memory, Some(version), status)
            }
            Err(StoreError::NotFound(location)) => {
                info!("No translation memory at {} yet, starting fresh", location);
                (TranslationMemory::new(), None, MemoryStatus::Fresh)
            }
            Err(e) => {
                error!("Failed to load translation memory: {}", e);
                let status = MemoryStatus::Unavailable {
                    error: e.to_string(),
                };
                (TranslationMemory::new(), None, status)
            }
        }
    }

    /// Reconcile, translate what is missing and merge. Returns the result and keys merged.
    async fn process_language(
        &self,
        language: &Language,
        entries: &[StringEntry],
        memory: &mut TranslationMemory,
    ) -> (LanguageResult, usize) {
        let reconciliation = reconcile(entries, language.name, memory);
        let mut combined: BTreeMap<String, String> = reconciliation.cached.clone();
        let mut error = None;
        let mut translated = 0;
        let mut added = 0;

        match self
            .translator
            .translate_batch(&reconciliation.missing, language)
            .await
        {
            Ok(fresh) => {
                translated = fresh.len();
                added = memory.merge(language.name, &fresh);
                combined.extend(fresh);
            }
            Err(e) => {
                warn!("Translation into {} failed: {}", language.name, e);
                error = Some(e.to_string());
            }
        }

        info!(
            "{}: {} cached, {} translated, {} requested",
            language.name,
            reconciliation.cached.len(),
            translated,
            reconciliation.missing.len()
        );

        let entries: Vec<StringEntry> = combined
            .into_iter()
            .map(|(key, value)| StringEntry::new(key, value))
            .collect();

        let result = LanguageResult {
            language: language.name.to_string(),
            code: language.code.to_string(),
            cached: reconciliation.cached.len(),
            translated,
            xml: parser::render(&entries),
            entries,
            error,
        };

        (result, added)
    }

    async fn persist(
        &self,
        memory: &TranslationMemory,
        version: Option<&VersionToken>,
        status: &MemoryStatus,
        keys_added: usize,
    ) -> PersistOutcome {
        if let MemoryStatus::Unavailable { error } = status {
            warn!("Not saving translation memory: it could not be loaded");
            return PersistOutcome::Skipped {
                reason: format!("translation memory could not be loaded: {}", error),
            };
        }

        if keys_added == 0 {
            info!("No new translations, translation memory left as is");
            return PersistOutcome::Unchanged;
        }

        match self.store.save(memory, version).await {
            Ok(()) => {
                info!(
                    "✓ Saved {} new translations to {}",
                    keys_added,
                    self.store.describe()
                );
                PersistOutcome::Saved { keys_added }
            }
            Err(e) => {
                error!("Failed to save translation memory: {}", e);
                PersistOutcome::Failed {
                    conflict: matches!(e, StoreError::Conflict),
                    error: e.to_string(),
                }
            }
        }
    }
}

fn emit(events: &UnboundedSender<SessionEvent>, event: SessionEvent) {
    if events.send(event).is_err() {
        warn!("Result stream closed, continuing without display");
    }
}
