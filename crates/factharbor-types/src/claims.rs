//! Claim-side entities (§3.1): `AtomicClaim`, `ImpliedClaim`, and the
//! Gate 1 bookkeeping structure that Stage 1 emits alongside them.

use serde::{Deserialize, Serialize};

use crate::ClaimId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimRole {
    Attribution,
    Source,
    Timing,
    Core,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Centrality {
    Low,
    Medium,
    High,
}

/// A minimally self-contained assertion extracted from the input; the unit
/// of verdict (§3.1, GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomicClaim {
    pub id: ClaimId,
    pub text: String,
    pub claim_role: ClaimRole,
    pub centrality: Centrality,
    pub is_central: bool,
    /// In `[0,1]`.
    pub check_worthiness: f32,
    pub key_entities: Vec<String>,
    pub passed_fidelity: bool,
    /// Whether this claim tests the inverse of another central claim's
    /// thesis (§9 open question: the handshake with Stage 4 is informal, so
    /// this flag is carried but Stage 4 never infers it on its own — see
    /// DESIGN.md).
    pub is_counter_claim: bool,
}

impl AtomicClaim {
    /// Checks the `isCentral ⇒ centrality = high` invariant (§3.1, §8).
    pub fn centrality_invariant_holds(&self) -> bool {
        !self.is_central || matches!(self.centrality, Centrality::High)
    }
}

/// The thesis the pipeline holds the input to, derived strictly from the
/// input text — never from evidence (§3.1, GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpliedClaim {
    pub text: String,
}

impl ImpliedClaim {
    pub const MAX_WORDS: usize = 20;

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn within_word_budget(&self) -> bool {
        self.word_count() <= Self::MAX_WORDS
    }
}

/// Why a candidate claim was dropped at Gate 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate1FilterReason {
    FailedFidelity,
    FailedOpinion,
    FailedSpecificity,
}

/// Output of Gate 1 claim validation (§4.E).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gate1Stats {
    pub total_claims: usize,
    pub passed_claims: usize,
    pub filtered_claims: usize,
    pub filtered_reasons: Vec<(ClaimId, Gate1FilterReason)>,
    pub central_claims_kept: usize,
    /// `passedFidelity` ratio reported as `(passed, total)` so callers can
    /// render it as "1/1" the way the end-to-end scenarios in §8 expect.
    pub passed_fidelity: (usize, usize),
}
