use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::{
    Cycle, CycleAction, CyclesState, HistorySummary, format_countdown, next_cycle_id, reduce,
};
use crate::storage::{KeyValueStore, PersistedState, load_state, save_state};
use crate::validation::{FieldError, check_minutes, validate_task};

pub const DEFAULT_TITLE: &str = "Cycle Timer";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CycleError {
    #[error("invalid task: {0}")]
    InvalidTask(FieldError),
    #[error("invalid duration: {0}")]
    InvalidMinutes(FieldError),
}

/// Owns the cycle history and the transient countdown tracking. Every
/// mutation goes through `reduce` and is written through to `kv`.
pub struct CycleStore<S: KeyValueStore> {
    kv: S,
    state: CyclesState,
    amount_seconds_passed: u64,
    title: String,
}

impl<S: KeyValueStore> CycleStore<S> {
    pub fn open(kv: S) -> Self {
        let persisted = load_state(&kv);
        let mut store = Self {
            kv,
            state: persisted.cycles_state,
            amount_seconds_passed: persisted.amount_seconds_passed,
            title: DEFAULT_TITLE.to_string(),
        };
        store.refresh_title();
        store
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.state.cycles
    }

    pub fn state(&self) -> &CyclesState {
        &self.state
    }

    pub fn active_cycle(&self) -> Option<&Cycle> {
        self.state.active_cycle()
    }

    pub fn active_cycle_id(&self) -> Option<&str> {
        self.state.active_cycle_id.as_deref()
    }

    pub fn amount_seconds_passed(&self) -> u64 {
        self.amount_seconds_passed
    }

    /// Window title mirroring the countdown, or the default label when idle.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.active_cycle()
            .map(|cycle| cycle.target_seconds().saturating_sub(self.amount_seconds_passed))
            .unwrap_or(0)
    }

    pub fn history_summary(&self) -> HistorySummary {
        self.state.summary()
    }

    pub fn storage(&self) -> &S {
        &self.kv
    }

    pub fn create_cycle(
        &mut self,
        task: &str,
        minutes_amount: u32,
        now: DateTime<Utc>,
    ) -> Result<String, CycleError> {
        let task = validate_task(task).map_err(CycleError::InvalidTask)?;
        let minutes_amount =
            check_minutes(i64::from(minutes_amount)).map_err(CycleError::InvalidMinutes)?;

        let id = next_cycle_id(&self.state, now);
        let cycle = Cycle {
            id: id.clone(),
            task,
            minutes_amount,
            start_date: now,
            interrupted_date: None,
            finished_date: None,
        };
        info!(cycle_id = %id, task = %cycle.task, minutes_amount, "cycle started");

        self.amount_seconds_passed = 0;
        self.dispatch(CycleAction::Create(cycle));
        Ok(id)
    }

    pub fn mark_active_cycle_finished(&mut self, now: DateTime<Utc>) {
        let Some(id) = self.state.active_cycle_id.clone() else {
            debug!("finish requested without an active cycle");
            return;
        };
        info!(cycle_id = %id, "cycle finished");
        self.dispatch(CycleAction::MarkActiveFinished { at: now });
    }

    pub fn interrupt_active_cycle(&mut self, now: DateTime<Utc>) {
        let Some(id) = self.state.active_cycle_id.clone() else {
            debug!("interrupt requested without an active cycle");
            return;
        };
        info!(cycle_id = %id, seconds_passed = self.amount_seconds_passed, "cycle interrupted");
        self.dispatch(CycleAction::InterruptActive { at: now });
        self.reset_active_cycle_tracking();
    }

    /// Clears seconds passed and recomputes the title label; the cycle itself
    /// is untouched. With no active cycle the title falls back to the default.
    pub fn reset_active_cycle_tracking(&mut self) {
        let changed = self.amount_seconds_passed != 0;
        self.amount_seconds_passed = 0;
        self.refresh_title();
        if changed {
            self.persist();
        }
    }

    pub fn set_amount_seconds_passed(&mut self, seconds: u64) {
        if self.amount_seconds_passed == seconds {
            return;
        }
        self.amount_seconds_passed = seconds;
        self.refresh_title();
        self.persist();
    }

    fn dispatch(&mut self, action: CycleAction) {
        self.state = reduce(&self.state, action);
        self.refresh_title();
        self.persist();
    }

    fn refresh_title(&mut self) {
        self.title = match self.active_cycle() {
            Some(cycle) => format!(
                "{} - {}",
                format_countdown(self.remaining_seconds()),
                cycle.task
            ),
            None => DEFAULT_TITLE.to_string(),
        };
    }

    fn persist(&mut self) {
        let snapshot = PersistedState {
            cycles_state: self.state.clone(),
            amount_seconds_passed: self.amount_seconds_passed,
        };
        if let Err(err) = save_state(&mut self.kv, &snapshot) {
            warn!(%err, "failed to persist cycles state");
        }
    }
}
