//! Keeps the prompt history bounded.
//!
//! Turns accumulate verbatim until the window would exceed its cap. The turn
//! that overflows it triggers one synchronous compaction: everything except the
//! most recent `tail` turns is summarised by the narrator, the summary is
//! appended to the digest, and the window is cut back to the tail.

use tracing::{info, warn};

use crate::engine::directive_parser::clean_narration;
use crate::engine::llm_client::Narrator;
use crate::engine::prompt_builder::PromptBuilder;
use crate::model::message::{History, Turn};

pub const DEFAULT_WINDOW_CAP: usize = 11;
pub const DEFAULT_WINDOW_TAIL: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactorState {
    Accumulating,
    Compacting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompactionOutcome {
    /// The window is still under its cap.
    Accumulated,
    Compacted { summarized_turns: usize },
    /// Summarising failed; the window is kept and compaction retries on the next turn.
    Deferred { reason: String },
}

#[derive(Debug, Clone)]
pub struct ContextCompactor {
    cap: usize,
    tail: usize,
    state: CompactorState,
}

impl Default for ContextCompactor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAP, DEFAULT_WINDOW_TAIL)
    }
}

impl ContextCompactor {
    /// `tail` is clamped below `cap` so a compaction always evicts something.
    pub fn new(cap: usize, tail: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            tail: tail.min(cap - 1),
            state: CompactorState::Accumulating,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn state(&self) -> CompactorState {
        self.state
    }

    pub fn push(
        &mut self,
        history: &mut History,
        turn: Turn,
        narrator: &dyn Narrator,
    ) -> CompactionOutcome {
        history.window.push(turn);
        if history.window.len() <= self.cap {
            return CompactionOutcome::Accumulated;
        }

        self.state = CompactorState::Compacting;
        let outcome = self.compact(history, narrator);
        self.state = CompactorState::Accumulating;
        outcome
    }

    fn compact(&self, history: &mut History, narrator: &dyn Narrator) -> CompactionOutcome {
        let split = history.window.len() - self.tail;
        let transcript = history.window[..split]
            .iter()
            .map(Turn::transcript_line)
            .collect::<Vec<_>>()
            .join("\n");

        let summary = match narrator.generate(&PromptBuilder::summary(&transcript)) {
            Ok(text) => clean_narration(&text).trim().to_string(),
            Err(e) => {
                warn!(error = %e, "history compaction failed, keeping window");
                return CompactionOutcome::Deferred {
                    reason: e.to_string(),
                };
            }
        };

        if summary.is_empty() {
            warn!("narrator returned an empty summary, keeping window");
            return CompactionOutcome::Deferred {
                reason: "empty summary".to_string(),
            };
        }

        history.digest.push(summary);
        history.window.drain(..split);
        info!(
            summarized = split,
            kept = history.window.len(),
            digest_entries = history.digest.len(),
            "compacted history"
        );

        CompactionOutcome::Compacted {
            summarized_turns: split,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::llm_client::AdapterError;
    use std::cell::RefCell;

    struct FixedSummary {
        calls: RefCell<Vec<String>>,
        reply: Result<String, String>,
    }

    impl FixedSummary {
        fn ok(text: &str) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                reply: Ok(text.to_string()),
            }
        }

        fn failing() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                reply: Err("quota exceeded".to_string()),
            }
        }
    }

    impl Narrator for FixedSummary {
        fn generate(&self, prompt: &str) -> Result<String, AdapterError> {
            self.calls.borrow_mut().push(prompt.to_string());
            self.reply.clone().map_err(AdapterError::Unavailable)
        }
    }

    fn fill(compactor: &mut ContextCompactor, history: &mut History, n: usize, narrator: &dyn Narrator) -> Vec<CompactionOutcome> {
        (0..n)
            .map(|i| compactor.push(history, Turn::player(format!("turn {i}")), narrator))
            .collect()
    }

    #[test]
    fn test_compacts_once_on_twelfth_turn() {
        let narrator = FixedSummary::ok("Elara met Bram at the Rusty Anchor.");
        let mut compactor = ContextCompactor::new(11, 5);
        let mut history = History::default();

        let outcomes = fill(&mut compactor, &mut history, 11, &narrator);
        assert!(outcomes.iter().all(|o| *o == CompactionOutcome::Accumulated));
        assert!(narrator.calls.borrow().is_empty());

        let outcome = compactor.push(&mut history, Turn::narrator("twelfth"), &narrator);
        assert_eq!(outcome, CompactionOutcome::Compacted { summarized_turns: 7 });
        assert_eq!(narrator.calls.borrow().len(), 1);
        assert_eq!(history.digest, vec!["Elara met Bram at the Rusty Anchor."]);
        assert_eq!(history.window.len(), 5);
        assert_eq!(history.window.last().map(|t| t.text.as_str()), Some("twelfth"));
        assert_eq!(compactor.state(), CompactorState::Accumulating);
    }

    #[test]
    fn test_summary_prompt_contains_evicted_turns_only() {
        let narrator = FixedSummary::ok("summary");
        let mut compactor = ContextCompactor::new(3, 1);
        let mut history = History::default();
        fill(&mut compactor, &mut history, 4, &narrator);

        let calls = narrator.calls.borrow();
        assert!(calls[0].contains("PLAYER: turn 0"));
        assert!(calls[0].contains("PLAYER: turn 2"));
        assert!(!calls[0].contains("turn 3"));
    }

    #[test]
    fn test_digest_is_append_only() {
        let narrator = FixedSummary::ok("more happened");
        let mut compactor = ContextCompactor::new(3, 1);
        let mut history = History::default();
        fill(&mut compactor, &mut history, 10, &narrator);
        assert_eq!(history.digest.len(), 3);
        assert!(history.window.len() <= 3);
    }

    #[test]
    fn test_failed_summary_keeps_window() {
        let narrator = FixedSummary::failing();
        let mut compactor = ContextCompactor::new(3, 1);
        let mut history = History::default();
        let outcomes = fill(&mut compactor, &mut history, 4, &narrator);
        assert!(matches!(outcomes[3], CompactionOutcome::Deferred { .. }));
        assert_eq!(history.window.len(), 4);
        assert!(history.digest.is_empty());
    }

    #[test]
    fn test_tail_clamped_below_cap() {
        let compactor = ContextCompactor::new(4, 9);
        assert_eq!(compactor.tail(), 3);
    }
}
