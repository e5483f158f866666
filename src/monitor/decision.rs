use chrono::NaiveDateTime;
use serde::Deserialize;

use super::history::HistoryEntry;
use super::price::parse_price;
use crate::error::MonitorError;

/// Thresholds, in whole price units, that separate noise from real moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ThresholdPolicy {
    /// Outside an episode, a move at least this large opens one and alerts.
    pub change_threshold: u64,
    /// Inside an episode, a move below this closes it.
    pub settle_threshold: u64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            change_threshold: 20,
            settle_threshold: 10,
        }
    }
}

/// Per-cycle view of the last observation against the new sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorState {
    pub last_entry: HistoryEntry,
    pub current_sample: String,
    pub delta: i64,
    pub was_in_progress: bool,
}

impl MonitorState {
    pub fn new(last_entry: &HistoryEntry, current_sample: &str) -> Result<Self, MonitorError> {
        let current = parse_price(current_sample)?;
        let last = parse_price(&last_entry.price)?;

        Ok(Self {
            last_entry: last_entry.clone(),
            current_sample: current_sample.to_string(),
            delta: current - last,
            was_in_progress: last_entry.in_progress,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoChange,
    SmallChange,
    Resolved,
    InProgress,
    ChangeDetected,
}

impl Outcome {
    pub fn persists(&self) -> bool {
        !matches!(self, Outcome::NoChange)
    }

    pub fn notifies(&self) -> bool {
        matches!(self, Outcome::Resolved | Outcome::ChangeDetected)
    }

    /// Whether the entry written for this outcome carries the `IT` flag.
    pub fn keeps_episode_open(&self) -> bool {
        matches!(self, Outcome::InProgress | Outcome::ChangeDetected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub message: String,
    pub persist: bool,
    pub new_entry: Option<HistoryEntry>,
    pub notify: bool,
    pub delta: i64,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    policy: ThresholdPolicy,
}

impl DecisionEngine {
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    pub fn classify(&self, state: &MonitorState) -> Outcome {
        let moved = state.delta.unsigned_abs();
        match (state.was_in_progress, moved) {
            (false, 0) => Outcome::NoChange,
            (false, m) if m < self.policy.change_threshold => Outcome::SmallChange,
            (true, m) if m < self.policy.settle_threshold => Outcome::Resolved,
            (true, _) => Outcome::InProgress,
            (false, _) => Outcome::ChangeDetected,
        }
    }

    /// Pure function of its inputs: the same entry, sample and clock always
    /// produce the same decision.
    pub fn decide(
        &self,
        last_entry: &HistoryEntry,
        current_sample: &str,
        now: NaiveDateTime,
    ) -> Result<Decision, MonitorError> {
        let state = MonitorState::new(last_entry, current_sample)?;
        let outcome = self.classify(&state);

        let last = &state.last_entry.price;
        let current = &state.current_sample;
        let delta = state.delta;
        let message = match outcome {
            Outcome::NoChange => "No price changes detected. Bye.".to_string(),
            Outcome::SmallChange => format!(
                "Small price change detected: {} to {} (${})",
                last, current, delta
            ),
            Outcome::Resolved => format!("DONE: {} to {} (${})", last, current, delta),
            Outcome::InProgress => "In progress. Enjoy!".to_string(),
            Outcome::ChangeDetected => {
                format!("Price change detected: {} to {} (${})", last, current, delta)
            }
        };

        let new_entry = outcome
            .persists()
            .then(|| HistoryEntry::new(now, current.as_str(), outcome.keeps_episode_open()));

        Ok(Decision {
            outcome,
            message,
            persist: new_entry.is_some(),
            new_entry,
            notify: outcome.notifies(),
            delta,
        })
    }
}
