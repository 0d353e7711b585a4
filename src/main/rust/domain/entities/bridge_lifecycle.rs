use std::time::{Duration, Instant};

use crate::domain::value_objects::BridgeState;

/// State transition record
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: BridgeState,
    pub to: BridgeState,
    pub timestamp: Instant,
    pub reason: Option<String>,
}

/// Domain entity tracking the publisher lifecycle.
///
/// States only move forward. Entering `Stopping` is the one-shot guard that
/// collapses concurrent stop triggers into a single teardown.
#[derive(Debug)]
pub struct BridgeLifecycle {
    current_state: BridgeState,
    state_history: Vec<StateTransition>,
    running_since: Option<Instant>,
}

impl BridgeLifecycle {
    pub fn new() -> Self {
        Self {
            current_state: BridgeState::Idle,
            state_history: Vec::new(),
            running_since: None,
        }
    }

    pub fn current_state(&self) -> BridgeState {
        self.current_state
    }

    pub fn uptime(&self) -> Option<Duration> {
        self.running_since.map(|start| start.elapsed())
    }

    pub fn transition_count(&self) -> usize {
        self.state_history.len()
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.state_history.last()
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.state_history
    }

    pub fn transition_to_initializing(&mut self) -> bool {
        self.record_transition(BridgeState::Initializing, None)
    }

    pub fn transition_to_joining(&mut self) -> bool {
        self.record_transition(BridgeState::Joining, None)
    }

    pub fn transition_to_publishing(&mut self) -> bool {
        self.record_transition(BridgeState::Publishing, None)
    }

    pub fn transition_to_running(&mut self) -> bool {
        let moved = self.record_transition(BridgeState::Running, None);
        if moved {
            self.running_since = Some(Instant::now());
        }
        moved
    }

    /// Returns true only for the caller that actually starts the teardown
    pub fn begin_teardown(&mut self, reason: impl Into<String>) -> bool {
        self.record_transition(BridgeState::Stopping, Some(reason.into()))
    }

    pub fn finish_teardown(&mut self) -> bool {
        self.record_transition(BridgeState::Stopped, None)
    }

    /// Number of teardowns started, never more than one
    pub fn teardown_count(&self) -> usize {
        self.state_history
            .iter()
            .filter(|t| t.to == BridgeState::Stopping)
            .count()
    }

    /// Reason recorded when the teardown began
    pub fn stop_reason(&self) -> Option<&str> {
        self.state_history
            .iter()
            .find(|t| t.to == BridgeState::Stopping)
            .and_then(|t| t.reason.as_deref())
    }

    fn record_transition(&mut self, new_state: BridgeState, reason: Option<String>) -> bool {
        if !self.current_state.can_transition_to(new_state) {
            return false;
        }

        self.state_history.push(StateTransition {
            from: self.current_state,
            to: new_state,
            timestamp: Instant::now(),
            reason,
        });
        self.current_state = new_state;
        true
    }
}

impl Default for BridgeLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
