use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const DEFAULT_JOURNAL_CAP: usize = 50;

/// Bounded event log. The oldest entry is evicted once `cap` is exceeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    entries: VecDeque<String>,
    cap: usize,
}

impl Default for Journal {
    fn default() -> Self {
        Self::with_cap(DEFAULT_JOURNAL_CAP)
    }
}

impl Journal {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    pub fn append(&mut self, entry: impl Into<String>) {
        self.entries.push_back(entry.into());
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn set_cap(&mut self, cap: usize) {
        self.cap = cap.max(1);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &String> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&String> {
        self.entries.back()
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &String> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }
}
