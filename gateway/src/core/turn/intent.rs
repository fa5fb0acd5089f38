use regex::Regex;

/// Decides when a caller turn ends the call.
#[derive(Debug, Clone)]
pub struct EndOfCallDetector {
    goodbye: Option<Regex>,
    max_empty_turns: u32,
}

impl EndOfCallDetector {
    /// Build a detector matching any of `phrases` as whole words, case-insensitively.
    ///
    /// An empty phrase list disables goodbye detection.
    pub fn new(phrases: &[String], max_empty_turns: u32) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = phrases
            .iter()
            .map(|p| normalize(p.trim()))
            .filter(|p| !p.is_empty())
            .map(|p| regex::escape(&p))
            .collect();

        let goodbye = if alternatives.is_empty() {
            None
        } else {
            // Boundaries are non-word characters rather than \b so phrases may end in punctuation
            Some(Regex::new(&format!(
                r"(?i)(?:^|\W)(?:{})(?:\W|$)",
                alternatives.join("|")
            ))?)
        };

        Ok(Self {
            goodbye,
            max_empty_turns: max_empty_turns.max(1),
        })
    }

    pub fn is_goodbye(&self, text: &str) -> bool {
        match &self.goodbye {
            Some(re) => re.is_match(&normalize(text)),
            None => false,
        }
    }

    /// True once `consecutive_empty` reaches the configured limit
    pub fn silence_limit_reached(&self, consecutive_empty: u32) -> bool {
        consecutive_empty >= self.max_empty_turns
    }

    pub fn max_empty_turns(&self) -> u32 {
        self.max_empty_turns
    }
}

// Speech recognizers emit typographic apostrophes ("that’s all")
fn normalize(text: &str) -> String {
    text.replace('\u{2019}', "'")
}
