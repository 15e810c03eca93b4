//! Pipeline input (§3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The immutable input to a CB pipeline job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Input {
    pub text: String,
    pub kind: InputKind,
    pub locale: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Claim,
    Article,
}

impl Input {
    pub fn new(text: impl Into<String>, kind: InputKind) -> Self {
        Self {
            text: text.into(),
            kind,
            locale: None,
            submitted_at: Utc::now(),
        }
    }
}
