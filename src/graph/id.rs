use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::IdGeneratorKind;

/// Source of ids for elements created without one.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh id. Ids are never reused by the same generator.
    fn next_id(&self) -> String;
}

/// Monotonic decimal ids starting at 1.
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    last: AtomicU64,
}

impl SequentialIdGenerator {
    /// Creates a generator whose first id is `start + 1`.
    pub fn starting_after(start: u64) -> Self {
        Self {
            last: AtomicU64::new(start),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        (self.last.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }
}

/// Random 128-bit ids rendered as 32 lowercase hex digits.
#[derive(Debug, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> String {
        hex::encode(rand::random::<[u8; 16]>())
    }
}

/// Builds the generator selected by configuration.
pub fn id_generator_for(kind: IdGeneratorKind) -> Box<dyn IdGenerator> {
    match kind {
        IdGeneratorKind::Sequential => Box::new(SequentialIdGenerator::default()),
        IdGeneratorKind::Random => Box::new(RandomIdGenerator),
    }
}
