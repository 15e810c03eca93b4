//! Deterministic id generation (§8 idempotence: "same input, config, and
//! seed twice yields identical ids"). Sequential rather than random so two
//! runs over the same input produce byte-identical `PipelineState`s.

use std::sync::atomic::{AtomicU64, Ordering};

pub struct IdGenerator {
    prefix: &'static str,
    next: AtomicU64,
}

impl IdGenerator {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{:04}", self.prefix, n)
    }
}

#[derive(Default)]
pub struct IdFactory {
    claims: IdGeneratorSlot,
    evidence: IdGeneratorSlot,
    contexts: IdGeneratorSlot,
}

struct IdGeneratorSlot(IdGenerator);

impl Default for IdGeneratorSlot {
    fn default() -> Self {
        // overwritten by IdFactory::new, placeholder prefix never surfaces
        IdGeneratorSlot(IdGenerator::new("id"))
    }
}

impl IdFactory {
    pub fn new() -> Self {
        Self {
            claims: IdGeneratorSlot(IdGenerator::new("claim")),
            evidence: IdGeneratorSlot(IdGenerator::new("ev")),
            contexts: IdGeneratorSlot(IdGenerator::new("ctx")),
        }
    }

    pub fn next_claim_id(&self) -> String {
        self.claims.0.next_id()
    }

    pub fn next_evidence_id(&self) -> String {
        self.evidence.0.next_id()
    }

    pub fn next_context_id(&self) -> String {
        self.contexts.0.next_id()
    }
}
