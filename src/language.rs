use serde::{Deserialize, Serialize};
use std::fmt;

/// Languages offered for explanations and summaries, with their backend codes.
/// Order is the order shown in the selection prompt.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("Assamese", "as"),
    ("Bengali", "bn"),
    ("Bodo", "brx"),
    ("Dogri", "doi"),
    ("Gujarati", "gu"),
    ("Hindi", "hi"),
    ("Kannada", "kn"),
    ("Kashmiri", "ks"),
    ("Konkani", "kok"),
    ("Maithili", "mai"),
    ("Malayalam", "ml"),
    ("Manipuri (Meitei)", "mni"),
    ("Marathi", "mr"),
    ("Nepali", "ne"),
    ("Odia", "or"),
    ("Punjabi", "pa"),
    ("Sanskrit", "sa"),
    ("Santhali", "sat"),
    ("Sindhi", "sd"),
    ("Tamil", "ta"),
    ("Telugu", "te"),
    ("Urdu", "ur"),
];

const DEFAULT_LANGUAGE: &str = "Hindi";

/// A selectable response language. Only constructible from an entry of [`LANGUAGES`],
/// so every value has a backend code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Language(usize);

impl Language {
    /// Look up by display name (case-insensitive) or by backend code
    pub fn from_name(name: &str) -> Option<Self> {
        let needle = name.trim();
        LANGUAGES
            .iter()
            .position(|(display, code)| {
                display.eq_ignore_ascii_case(needle) || code.eq_ignore_ascii_case(needle)
            })
            .map(Language)
    }

    pub fn name(&self) -> &'static str {
        LANGUAGES[self.0].0
    }

    pub fn code(&self) -> &'static str {
        LANGUAGES[self.0].1
    }

    pub fn all() -> impl Iterator<Item = Language> {
        (0..LANGUAGES.len()).map(Language)
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::from_name(DEFAULT_LANGUAGE).unwrap_or(Language(0))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for Language {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Language::from_name(&value).ok_or_else(|| format!("unknown language: {}", value))
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.name().to_string()
    }
}
