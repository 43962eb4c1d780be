// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-claim completion gate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// What ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionTrigger {
    /// The radio reported discovery finished.
    DiscoveryFinished,
    /// The scan window elapsed.
    Deadline,
    /// The caller aborted the session.
    Cancelled,
}

impl CompletionTrigger {
    fn code(self) -> u8 {
        match self {
            Self::DiscoveryFinished => 1,
            Self::Deadline => 2,
            Self::Cancelled => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::DiscoveryFinished),
            2 => Some(Self::Deadline),
            3 => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for CompletionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiscoveryFinished => f.write_str("discovery finished"),
            Self::Deadline => f.write_str("deadline"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

const UNCLAIMED: u8 = 0;

/// Gate that exactly one completion trigger can claim.
///
/// Claiming is the only authorization to tear a session down; a trigger
/// that loses observes the winner and does nothing.
#[derive(Debug)]
pub struct CompletionArbiter {
    winner: AtomicU8,
}

impl CompletionArbiter {
    pub fn new() -> Self {
        Self {
            winner: AtomicU8::new(UNCLAIMED),
        }
    }

    /// Try to claim the gate for `trigger`. Returns `true` for the winner only.
    pub fn try_claim(&self, trigger: CompletionTrigger) -> bool {
        self.winner
            .compare_exchange(
                UNCLAIMED,
                trigger.code(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn is_claimed(&self) -> bool {
        self.winner.load(Ordering::Acquire) != UNCLAIMED
    }

    /// Trigger that claimed the gate, if any.
    pub fn winner(&self) -> Option<CompletionTrigger> {
        CompletionTrigger::from_code(self.winner.load(Ordering::Acquire))
    }
}

impl Default for CompletionArbiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};

    #[test]
    fn test_first_claim_wins() {
        let gate = CompletionArbiter::new();
        assert!(!gate.is_claimed());
        assert_eq!(gate.winner(), None);

        assert!(gate.try_claim(CompletionTrigger::Deadline));
        assert!(!gate.try_claim(CompletionTrigger::DiscoveryFinished));
        assert!(!gate.try_claim(CompletionTrigger::Deadline));

        assert!(gate.is_claimed());
        assert_eq!(gate.winner(), Some(CompletionTrigger::Deadline));
    }

    #[test]
    fn test_simultaneous_claims_have_one_winner() {
        for _ in 0..50 {
            let gate = Arc::new(CompletionArbiter::new());
            let barrier = Arc::new(Barrier::new(3));
            let wins = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = [
                CompletionTrigger::DiscoveryFinished,
                CompletionTrigger::Deadline,
                CompletionTrigger::Cancelled,
            ]
            .into_iter()
            .map(|trigger| {
                let gate = Arc::clone(&gate);
                let barrier = Arc::clone(&barrier);
                let wins = Arc::clone(&wins);
                std::thread::spawn(move || {
                    barrier.wait();
                    if gate.try_claim(trigger) {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

            for h in handles {
                h.join().expect("claim thread");
            }
            assert_eq!(wins.load(Ordering::SeqCst), 1);
            assert!(gate.winner().is_some());
        }
    }
}
