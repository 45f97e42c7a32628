/// Collects transcript fragments of the current model turn and the
/// utterances of turns already completed.
#[derive(Debug, Default, Clone)]
pub struct TranscriptAccumulator {
    partial: String,
    utterances: Vec<String>,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_fragment(&mut self, text: &str) {
        self.partial.push_str(text);
    }

    pub fn partial(&self) -> &str {
        &self.partial
    }

    pub fn utterances(&self) -> &[String] {
        &self.utterances
    }

    /// Ends the turn. Returns the new utterance, or `None` if the turn said nothing.
    pub fn complete_turn(&mut self) -> Option<&str> {
        let text = std::mem::take(&mut self.partial);
        if text.trim().is_empty() {
            return None;
        }
        self.utterances.push(format!("AI: {text}"));
        self.utterances.last().map(String::as_str)
    }

    /// Flushes any partial turn and joins every utterance with newlines.
    pub fn finish(mut self) -> String {
        self.complete_turn();
        self.utterances.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_complete_flushes_once_and_clears() {
        let mut t = TranscriptAccumulator::new();
        t.push_fragment("আমি ");
        t.push_fragment("গল্প বলি");
        assert_eq!(t.complete_turn(), Some("AI: আমি গল্প বলি"));
        assert_eq!(t.partial(), "");
        assert_eq!(t.complete_turn(), None);
        assert_eq!(t.utterances().len(), 1);
    }

    #[test]
    fn finish_flushes_partial_and_joins() {
        let mut t = TranscriptAccumulator::new();
        t.push_fragment("one");
        t.complete_turn();
        t.push_fragment("two");
        assert_eq!(t.finish(), "AI: one\nAI: two");
    }

    #[test]
    fn empty_session_yields_empty_text() {
        assert_eq!(TranscriptAccumulator::new().finish(), "");
    }
}
