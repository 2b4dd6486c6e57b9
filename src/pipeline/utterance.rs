//! [`Utterance`]: one recognized or typed unit of text, split into words.

/// Immutable text unit consumed word-by-word by the orchestrator.
///
/// Construction trims the text and splits it on whitespace; blank input has
/// no utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    text: String,
    words: Vec<String>,
}

impl Utterance {
    /// `None` when `text` contains no words.
    pub fn from_text(text: &str) -> Option<Self> {
        let words: Vec<String> = text.split_whitespace().map(str::to_owned).collect();
        if words.is_empty() {
            return None;
        }
        Some(Self {
            text: words.join(" "),
            words,
        })
    }

    /// The normalized text (single spaces between words).
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
