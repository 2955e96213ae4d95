use serde::{Deserialize, Serialize};

/// A voice exposed by a speech-synthesis host.
///
/// Only [`Voice::lang`] takes part in matching; the other fields are carried
/// through so callers can pick the voice the probe found.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Voice {
    /// Human readable voice name (e.g. `"Google français"`).
    #[serde(default)]
    pub name: String,
    /// BCP 47 style language tag (e.g. `"en-GB"`, `"fr-CA"`).
    pub lang: String,
    /// Whether the host reports this voice as its default.
    #[serde(default)]
    pub default: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            default: false,
        }
    }

    /// The first two characters of this voice's language tag.
    pub fn language_prefix(&self) -> &str {
        language_prefix(&self.lang)
    }

    /// True if the two-character prefix of the tag equals `code` exactly.
    ///
    /// No case folding is applied: `"EN-us"` does not match `"en"`.
    pub fn matches(&self, code: &str) -> bool {
        self.language_prefix() == code
    }
}

/// Returns the first two characters of `tag`, or the whole tag if shorter.
pub fn language_prefix(tag: &str) -> &str {
    match tag.char_indices().nth(2) {
        Some((end, _)) => &tag[..end],
        None => tag,
    }
}

/// Returns the first voice whose language prefix equals `code`.
///
/// Scanning stops at the first hit.
pub fn find_voice<'a, I>(voices: I, code: &str) -> Option<&'a Voice>
where
    I: IntoIterator<Item = &'a Voice>,
{
    voices.into_iter().find(|voice| voice.matches(code))
}
