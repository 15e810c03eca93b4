//! `AnalysisContext` (a.k.a. ClaimBoundary), §3.1.

use serde::{Deserialize, Serialize};

use crate::ContextId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    Candidate,
    Merged,
    Finalized,
}

/// A top-level analytical frame with its own verdict: distinct
/// jurisdictions, methodologies, etc. Uncomparable across contexts (§3.1,
/// GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisContext {
    pub id: ContextId,
    pub name: String,
    pub short_name: String,
    pub subject: String,
    pub methodology: Option<String>,
    pub boundaries: Option<String>,
    pub geographic: Option<String>,
    pub temporal: Option<String>,
    pub status: ContextStatus,
    pub outcome: Option<String>,
    /// Ids of candidate contexts this context absorbed on merge (§4.G.2).
    pub constituent_scopes: Vec<ContextId>,
}

impl AnalysisContext {
    /// The 0.85 semantic-similarity merge threshold applies uniformly to
    /// context merging (§4.G.2) and evidence-statement dedup (§4.F.6); it is
    /// defined once here so both stages and `factharbor-config`'s default
    /// agree on the same constant.
    pub const MERGE_SIMILARITY_THRESHOLD: f32 = 0.85;
}
