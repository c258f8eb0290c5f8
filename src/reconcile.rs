use crate::memory::TranslationMemory;
use crate::parser::StringEntry;
use std::collections::BTreeMap;

/// Split of a requested batch against the memory for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Keys already translated, with the memory's value
    pub cached: BTreeMap<String, String>,
    /// Entries still to translate, in request order
    pub missing: Vec<StringEntry>,
}

/// Partition `requested` into cached and missing keys for `language`.
///
/// A cached translation is reused even if the source text for that key has
/// changed since it was produced.
pub fn reconcile(
    requested: &[StringEntry],
    language: &str,
    memory: &TranslationMemory,
) -> Reconciliation {
    let Some(known) = memory.language(language) else {
        return Reconciliation {
            cached: BTreeMap::new(),
            missing: requested.to_vec(),
        };
    };

    let mut result = Reconciliation::default();
    for entry in requested {
        match known.get(&entry.key) {
            Some(translated) => {
                result.cached.insert(entry.key.clone(), translated.clone());
            }
            None => result.missing.push(entry.clone()),
        }
    }
    result
}
