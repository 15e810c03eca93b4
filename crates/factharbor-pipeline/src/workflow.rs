//! Per-`(claim, context)` debate state machine and its audit log, adapted
//! from `council::workflow::CouncilWorkflow`'s state-transition bookkeeping
//! (§4.H: "advocated → consistent/low_consistency → challenged → reconciled
//! → validated → finalized; any stage can transition to failed_debate").

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebateState {
    Advocated,
    Consistent,
    LowConsistency,
    Challenged,
    Reconciled,
    Validated,
    Finalized,
    FailedDebate,
}

#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: DebateState,
    pub to: DebateState,
    pub at: DateTime<Utc>,
    pub reason: String,
}

pub struct DebateWorkflow {
    state: DebateState,
    history: Vec<StateTransition>,
}

impl DebateWorkflow {
    pub fn new(clock: &dyn factharbor_types::Clock) -> Self {
        Self {
            state: DebateState::Advocated,
            history: vec![StateTransition {
                from: DebateState::Advocated,
                to: DebateState::Advocated,
                at: clock.now(),
                reason: "debate started".to_string(),
            }],
        }
    }

    pub fn transition(&mut self, clock: &dyn factharbor_types::Clock, to: DebateState, reason: impl Into<String>) {
        let from = self.state.clone();
        self.state = to.clone();
        self.history.push(StateTransition {
            from,
            to,
            at: clock.now(),
            reason: reason.into(),
        });
    }

    pub fn current(&self) -> &DebateState {
        &self.state
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    pub fn is_failed(&self) -> bool {
        self.state == DebateState::FailedDebate
    }
}
