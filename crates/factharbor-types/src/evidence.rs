//! Evidence-side entities (§3.1): `EvidenceItem`, `EvidenceScope`.

use serde::{Deserialize, Serialize};

use crate::{ClaimId, ContextId, EvidenceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    PeerReviewedStudy,
    FactCheckReport,
    GovernmentReport,
    LegalDocument,
    NewsPrimary,
    NewsSecondary,
    ExpertStatement,
    OrganizationReport,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbativeValue {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimDirection {
    Supports,
    Refutes,
    Neutral,
}

/// Per-evidence source metadata. Never a verdict space (§3.1, GLOSSARY) —
/// nothing in Stage 4/5 is permitted to branch on `EvidenceScope` the way it
/// branches on `contextId`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceScope {
    pub name: String,
    pub methodology: Option<String>,
    pub boundaries: Option<String>,
    pub geographic: Option<String>,
    pub temporal: Option<String>,
}

/// One verifiable statement attached to a claim and a context (§3.1,
/// GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: EvidenceId,
    pub claim_id: ClaimId,
    pub statement: String,
    pub source_url: String,
    pub source_excerpt: String,
    pub source_authority: String,
    pub evidence_basis: String,
    pub source_type: SourceType,
    pub category: String,
    pub probative_value: ProbativeValue,
    pub claim_direction: ClaimDirection,
    pub evidence_scope: Option<EvidenceScope>,
    pub derivative_claim_unverified: bool,
    pub context_id: ContextId,
}

impl EvidenceItem {
    pub const MIN_STATEMENT_LEN: usize = 20;
    pub const MIN_EXCERPT_LEN: usize = 30;

    /// §3.1 invariant: `sourceExcerpt ≠ "" ∧ length(statement) ≥ 20`, plus
    /// the stricter §8 excerpt floor of 30 applied by the evidence filter
    /// (§4.F.5) before an item is retained.
    pub fn passes_quality_floor(&self) -> bool {
        !self.source_excerpt.is_empty()
            && self.statement.len() >= Self::MIN_STATEMENT_LEN
            && self.source_excerpt.len() >= Self::MIN_EXCERPT_LEN
    }
}
