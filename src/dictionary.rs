/// A lesson word paired with its steno chord notation. Multi-stroke chords
/// are joined with `/`. Words are identified by dictionary index, not text;
/// the same text can appear more than once with different chords.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub stroke: String,
}

/// Ordered lesson vocabulary, fixed for the session. Index order defines
/// unlock order.
#[derive(Clone, Debug, Default)]
pub struct Dictionary {
    words: Vec<Word>,
}

impl Dictionary {
    pub fn new(words: Vec<Word>) -> Self {
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[allow(dead_code)] // Used through the library target
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, index: usize) -> &Word {
        &self.words[index]
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }
}

/// Words excluded from practice, keyed by text. Insertion order is kept so
/// the persisted file stays stable across sessions.
#[derive(Clone, Debug, Default)]
pub struct Blacklist {
    words: Vec<String>,
}

impl Blacklist {
    pub fn new(words: Vec<String>) -> Self {
        Self { words }
    }

    pub fn contains(&self, text: &str) -> bool {
        self.words.iter().any(|w| w == text)
    }

    /// Returns false if the word was already present.
    pub fn insert(&mut self, text: &str) -> bool {
        if self.contains(text) {
            return false;
        }
        self.words.push(text.to_string());
        true
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    #[allow(dead_code)] // Used through the library target
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[allow(dead_code)] // Used through the library target
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
