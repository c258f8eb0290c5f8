//! The fixed set of target languages, in display order.

/// A translation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    /// ISO 639-1 code (e.g. "hi", "zh")
    pub code: &'static str,

    /// Short English name; also the key of this language in the translation memory
    pub name: &'static str,

    /// Name given to the model, with a regional hint where it helps
    pub prompt_name: &'static str,
}

const fn lang(code: &'static str, name: &'static str, prompt_name: &'static str) -> Language {
    Language {
        code,
        name,
        prompt_name,
    }
}

/// Every target language. Order matters: results are shown in this order.
pub const TARGET_LANGUAGES: [Language; 20] = [
    lang("hi", "Hindi", "Hindi"),
    lang("es", "Spanish", "Spanish"),
    lang("zh", "Mandarin Chinese", "Mandarin Chinese"),
    lang("pt", "Portuguese", "Portuguese"),
    lang("ru", "Russian", "Russian"),
    lang("ja", "Japanese", "Japanese"),
    lang("ko", "Korean", "Korean"),
    lang("id", "Indonesian", "Indonesian (Bahasa Indonesia)"),
    lang("tr", "Turkish", "Turkish"),
    lang("th", "Thai", "Thai"),
    lang("vi", "Vietnamese", "Vietnamese"),
    lang("fr", "French", "French"),
    lang("de", "German", "German"),
    lang("it", "Italian", "Italian"),
    lang("pl", "Polish", "Polish"),
    lang("bn", "Bengali", "Bengali"),
    lang("uk", "Ukrainian", "Ukrainian"),
    lang("ne", "Nepali", "Nepali (Nepal)"),
    lang("yo", "Yoruba", "Yoruba (Nigeria)"),
    lang("zu", "Zulu", "Zulu (South Africa)"),
];

pub fn target_languages() -> &'static [Language] {
    &TARGET_LANGUAGES
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn find(name: &str) -> Option<&'static Language> {
        TARGET_LANGUAGES
            .iter()
            .find(|lang| lang.name.eq_ignore_ascii_case(name))
    }

    #[test]
    fn test_twenty_languages() {
        assert_eq!(target_languages().len(), 20);
    }

    #[test]
    fn test_display_order() {
        let names: Vec<&str> = target_languages().iter().map(|l| l.name).collect();
        assert_eq!(
            names,
            vec![
                "Hindi",
                "Spanish",
                "Mandarin Chinese",
                "Portuguese",
                "Russian",
                "Japanese",
                "Korean",
                "Indonesian",
                "Turkish",
                "Thai",
                "Vietnamese",
                "French",
                "German",
                "Italian",
                "Polish",
                "Bengali",
                "Ukrainian",
                "Nepali",
                "Yoruba",
                "Zulu",
            ]
        );
    }

    #[test]
    fn test_codes_and_names_are_unique() {
        let codes: HashSet<_> = target_languages().iter().map(|l| l.code).collect();
        let names: HashSet<_> = target_languages().iter().map(|l| l.name).collect();
        assert_eq!(codes.len(), 20);
        assert_eq!(names.len(), 20);
    }

    #[test]
    fn test_prompt_names_carry_regional_hints() {
        assert_eq!(
            find("Indonesian").map(|l| l.prompt_name),
            Some("Indonesian (Bahasa Indonesia)")
        );
        assert_eq!(find("Zulu").map(|l| l.prompt_name), Some("Zulu (South Africa)"));
        assert_eq!(find("Hindi").map(|l| l.prompt_name), Some("Hindi"));
    }

    #[test]
    fn test_find_is_case_insensitive() {
        assert_eq!(find("mandarin chinese").map(|l| l.code), Some("zh"));
        assert!(find("Klingon").is_none());
    }
}
