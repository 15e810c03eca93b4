//! Verdict and overall-assessment entities (§3.1).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ClaimId, ContextId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Support {
    StronglySupports,
    Supports,
    Neutral,
    Refutes,
    StronglyRefutes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weight {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFactor {
    pub factor: String,
    pub explanation: String,
    pub supports: Support,
    pub weight: Weight,
    /// Evidence ids this factor cites. Every entry must resolve to a real
    /// evidence id for the claim (§4.H.5 grounding validation, §8).
    pub cited_evidence_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmPotential {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactualBasis {
    Established,
    Disputed,
    Opinion,
    Alleged,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyResult {
    pub samples: u32,
    pub consistency_score: f32,
    pub low_consistency: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub challenge_id: String,
    pub response: String,
    pub conceded: bool,
}

/// `verdictBands` classification of `answerPct` (§4.A), independent of Gate
/// 4's confidence-based `QualityGate`: this answers "how true", Gate 4
/// answers "how sure".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictBand {
    True,
    MostlyTrue,
    LeaningTrue,
    Mixed,
    LeaningFalse,
    MostlyFalse,
    False,
}

impl VerdictBand {
    /// Classifies `answer_pct` against the six descending thresholds
    /// defined in `factharbor-config`'s `VerdictBands` (§4.A). Bands
    /// partition `[0,100]` into closed intervals from the top down;
    /// `mixed_confidence_threshold` does not participate here — it
    /// governs when `MIXED`/`UNVERIFIED` is reported in place of a
    /// band at low confidence, which is the aggregation stage's call,
    /// not this classifier's.
    pub fn classify(
        answer_pct: f32,
        true_min: f32,
        mostly_true_min: f32,
        leaning_true_min: f32,
        mixed_min: f32,
        leaning_false_min: f32,
        mostly_false_min: f32,
    ) -> Self {
        if answer_pct >= true_min {
            VerdictBand::True
        } else if answer_pct >= mostly_true_min {
            VerdictBand::MostlyTrue
        } else if answer_pct >= leaning_true_min {
            VerdictBand::LeaningTrue
        } else if answer_pct >= mixed_min {
            VerdictBand::Mixed
        } else if answer_pct >= leaning_false_min {
            VerdictBand::LeaningFalse
        } else if answer_pct >= mostly_false_min {
            VerdictBand::MostlyFalse
        } else {
            VerdictBand::False
        }
    }
}

/// Verdict for one `(claim, context)` pair (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimVerdict {
    pub claim_id: ClaimId,
    pub context_id: ContextId,
    /// In `[0,100]`.
    pub answer_pct: f32,
    /// In `[0,100]`.
    pub confidence_pct: f32,
    pub short_answer: String,
    pub key_factors: Vec<KeyFactor>,
    pub boundary_findings: String,
    pub consistency_result: ConsistencyResult,
    pub challenge_responses: Vec<ChallengeResponse>,
    /// In `[0,1]`.
    pub triangulation_score: f32,
    pub is_inverted: bool,
    pub harm_potential: HarmPotential,
    pub is_contested: bool,
    pub factual_basis: FactualBasis,
    pub verdict_band: VerdictBand,
}

impl ClaimVerdict {
    pub fn clamp_ranges(&mut self) {
        self.answer_pct = self.answer_pct.clamp(0.0, 100.0);
        self.confidence_pct = self.confidence_pct.clamp(0.0, 100.0);
        self.triangulation_score = self.triangulation_score.clamp(0.0, 1.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityGate {
    High,
    Medium,
    Low,
    Insufficient,
}

impl QualityGate {
    /// Gate 4 deterministic classification thresholds (§4.I.4): HIGH≥70,
    /// MEDIUM≥40, LOW>0, INSUFFICIENT=0.
    pub fn from_confidence_pct(confidence_pct: f32) -> Self {
        if confidence_pct >= 70.0 {
            QualityGate::High
        } else if confidence_pct >= 40.0 {
            QualityGate::Medium
        } else if confidence_pct > 0.0 {
            QualityGate::Low
        } else {
            QualityGate::Insufficient
        }
    }
}

/// `coverageMatrix[claim][context]` — which claim/context pairs were
/// actually evaluated (§4.I.5).
pub type CoverageMatrix = HashMap<ClaimId, HashMap<ContextId, bool>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityGates {
    pub overall: QualityGate,
    pub per_claim: HashMap<ClaimId, QualityGate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
}

/// Top-level output of a CB pipeline job (§3.1, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallAssessment {
    pub status: JobStatus,
    pub fatal_reason: Option<String>,
    pub verdict_narrative: String,
    pub claim_boundaries: Vec<crate::AnalysisContext>,
    pub claim_verdicts: Vec<ClaimVerdict>,
    pub coverage_matrix: CoverageMatrix,
    pub quality_gates: QualityGates,
    pub analysis_warnings: Vec<crate::AnalysisWarning>,
}
