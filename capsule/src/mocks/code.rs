//! Scripted code generator.

use crate::code::CodeGenerator;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Replays a scripted list of codes, then counts upwards.
///
/// Counter codes are zero-padded decimals (`0000000001`, `0000000002`, ...),
/// which are valid alphanumeric codes. Scripting the same code several
/// times forces collisions.
#[derive(Debug, Clone, Default)]
pub struct SequenceCodeGenerator {
    scripted: Arc<Mutex<VecDeque<String>>>,
    counter: Arc<AtomicU64>,
    draws: Arc<AtomicU64>,
}

impl SequenceCodeGenerator {
    /// Create a generator that replays `codes` first.
    #[must_use]
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scripted: Arc::new(Mutex::new(codes.into_iter().map(Into::into).collect())),
            counter: Arc::new(AtomicU64::new(0)),
            draws: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of codes drawn so far.
    #[must_use]
    pub fn draws(&self) -> u64 {
        self.draws.load(Ordering::SeqCst)
    }
}

impl CodeGenerator for SequenceCodeGenerator {
    fn generate(&self, length: usize) -> String {
        self.draws.fetch_add(1, Ordering::SeqCst);

        let scripted = self
            .scripted
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());

        scripted.unwrap_or_else(|| {
            let next = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            format!("{next:0length$}")
        })
    }
}
