use crate::store::StoreError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cached translations: language name -> key -> translated text.
///
/// Values are never empty. Anything empty coming in through [`merge`](Self::merge)
/// or [`decode`](Self::decode) is dropped, so a key is either translated or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslationMemory {
    languages: BTreeMap<String, BTreeMap<String, String>>,
}

impl TranslationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached translations for one language, if any were ever stored
    pub fn language(&self, language: &str) -> Option<&BTreeMap<String, String>> {
        self.languages.get(language)
    }

    pub fn get(&self, language: &str, key: &str) -> Option<&str> {
        self.languages
            .get(language)
            .and_then(|keys| keys.get(key))
            .map(String::as_str)
    }

    /// Number of languages with at least one cached key
    pub fn language_count(&self) -> usize {
        self.languages.len()
    }

    pub fn key_count(&self) -> usize {
        self.languages.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// Merge fresh translations for `language`, new values winning on collision.
    ///
    /// Returns how many keys were inserted or changed.
    pub fn merge(&mut self, language: &str, translations: &BTreeMap<String, String>) -> usize {
        let mut changed = 0;

        for (key, value) in translations {
            if value.trim().is_empty() {
                continue;
            }
            let slot = self.languages.entry(language.to_string()).or_default();
            if slot.get(key) != Some(value) {
                slot.insert(key.clone(), value.clone());
                changed += 1;
            }
        }

        changed
    }

    /// Serialize to pretty JSON and base64, the form stored in the repository
    pub fn encode(&self) -> Result<String, StoreError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| StoreError::EncodeError(e.to_string()))?;
        Ok(BASE64.encode(json))
    }

    /// Decode base64 content (line breaks allowed, as GitHub sends it) into a memory
    pub fn decode(content: &str) -> Result<Self, StoreError> {
        let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64
            .decode(compact.as_bytes())
            .map_err(|e| StoreError::DecodeError(format!("invalid base64: {}", e)))?;

        let mut memory: TranslationMemory = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::DecodeError(format!("invalid memory JSON: {}", e)))?;
        memory.drop_empty();

        Ok(memory)
    }

    fn drop_empty(&mut self) {
        for keys in self.languages.values_mut() {
            keys.retain(|_, value| !value.trim().is_empty());
        }
        self.languages.retain(|_, keys| !keys.is_empty());
    }
}
