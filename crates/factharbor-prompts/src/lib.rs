//! Prompt Registry (§4.B): loads, hashes, renders, and versions prompt
//! templates. Template storage (files or a DB) is an external collaborator
//! (spec.md §1); this crate owns only the hashing/versioning/rendering
//! behavior layered on top of whatever raw content a `TemplateSource`
//! supplies.

mod registry;
mod source;

pub use registry::*;
pub use source::*;
