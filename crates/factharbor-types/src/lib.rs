//! Shared data model for the FactHarbor ClaimAssessmentBoundary (CB) pipeline.
//!
//! This crate owns every entity named in the pipeline's data model (claims,
//! evidence, analysis contexts, verdicts, the overall assessment) plus the
//! three external capability traits the pipeline core consumes: `LlmCall`,
//! `Search`, and `Reliability`. No stage logic lives here — only the types
//! stages pass between each other and the contracts they call through.

pub mod capabilities;
pub mod claims;
pub mod evidence;
pub mod input;
pub mod scope;
pub mod verdict;
pub mod warnings;

pub use capabilities::*;
pub use claims::*;
pub use evidence::*;
pub use input::*;
pub use scope::*;
pub use verdict::*;
pub use warnings::*;

/// Identifier for an [`AnalysisContext`] reserved for evidence that is
/// cross-cutting across every inferred context (§4.G.3).
pub const CTX_GENERAL: &str = "CTX_GENERAL";

/// Identifier for an [`AnalysisContext`] reserved for evidence whose context
/// could not be inferred at all (§4.G.3).
pub const CTX_UNSCOPED: &str = "CTX_UNSCOPED";

/// A job-scoped opaque identifier. Kept as a newtype (rather than bare
/// `String`) so stages can't accidentally compare a claim id against a
/// context id even though both are strings underneath (§9: "opaque ids").
pub type ClaimId = String;
pub type ContextId = String;
pub type EvidenceId = String;
