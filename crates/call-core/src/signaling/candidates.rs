//! Peer candidate bookkeeping
//!
//! The peer's candidate list in the document only grows. The tracker
//! remembers how much of it has been consumed and holds candidates that
//! arrived before a remote description could accept them.

use std::collections::VecDeque;

use crate::types::IceCandidate;

#[derive(Debug, Default)]
pub struct CandidateTracker {
    consumed: usize,
    pending: VecDeque<IceCandidate>,
}

impl CandidateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidates in `all` not seen before, in append order
    pub fn take_new(&mut self, all: &[IceCandidate]) -> Vec<IceCandidate> {
        if all.len() <= self.consumed {
            return Vec::new();
        }
        let fresh = all[self.consumed..].to_vec();
        self.consumed = all.len();
        fresh
    }

    /// Hold candidates until a remote description is applied
    pub fn buffer(&mut self, candidates: impl IntoIterator<Item = IceCandidate>) {
        self.pending.extend(candidates);
    }

    pub fn drain_buffered(&mut self) -> Vec<IceCandidate> {
        self.pending.drain(..).collect()
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn buffered_len(&self) -> usize {
        self.pending.len()
    }
}
