use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_MINUTES: u32 = 5;
pub const MAX_MINUTES: u32 = 60;
pub const MAX_TASK_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    pub id: String,
    pub task: String,
    pub minutes_amount: u32,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    Active,
    Finished,
    Interrupted,
}

impl CycleStatus {
    pub fn label(self) -> &'static str {
        match self {
            CycleStatus::Active => "in progress",
            CycleStatus::Finished => "finished",
            CycleStatus::Interrupted => "interrupted",
        }
    }
}

impl Cycle {
    pub fn status(&self) -> CycleStatus {
        if self.finished_date.is_some() {
            CycleStatus::Finished
        } else if self.interrupted_date.is_some() {
            CycleStatus::Interrupted
        } else {
            CycleStatus::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() == CycleStatus::Active
    }

    /// Countdown length in seconds.
    pub fn target_seconds(&self) -> u64 {
        u64::from(self.minutes_amount) * 60
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.finished_date.or(self.interrupted_date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CyclesState {
    #[serde(default)]
    pub cycles: Vec<Cycle>,
    #[serde(default)]
    pub active_cycle_id: Option<String>,
}

impl CyclesState {
    pub fn cycle(&self, id: &str) -> Option<&Cycle> {
        self.cycles.iter().find(|cycle| cycle.id == id)
    }

    pub fn active_cycle(&self) -> Option<&Cycle> {
        self.active_cycle_id
            .as_deref()
            .and_then(|id| self.cycle(id))
            .filter(|cycle| cycle.is_active())
    }

    /// Drops an `active_cycle_id` that no longer points at a running cycle.
    /// Returns true when something was cleared.
    pub fn repair(&mut self) -> bool {
        if self.active_cycle_id.is_some() && self.active_cycle().is_none() {
            self.active_cycle_id = None;
            return true;
        }
        false
    }

    pub fn summary(&self) -> HistorySummary {
        let mut summary = HistorySummary::default();
        for cycle in &self.cycles {
            match cycle.status() {
                CycleStatus::Active => summary.active += 1,
                CycleStatus::Finished => {
                    summary.finished += 1;
                    summary.focused_minutes += u64::from(cycle.minutes_amount);
                }
                CycleStatus::Interrupted => summary.interrupted += 1,
            }
        }
        summary
    }

    /// Distinct task names, most recent first.
    pub fn recent_tasks(&self) -> Vec<String> {
        let mut tasks: Vec<String> = Vec::new();
        for cycle in self.cycles.iter().rev() {
            if !tasks.iter().any(|task| task == &cycle.task) {
                tasks.push(cycle.task.clone());
            }
        }
        tasks
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistorySummary {
    pub finished: usize,
    pub interrupted: usize,
    pub active: usize,
    pub focused_minutes: u64,
}

#[derive(Debug, Clone)]
pub enum CycleAction {
    Create(Cycle),
    MarkActiveFinished { at: DateTime<Utc> },
    InterruptActive { at: DateTime<Utc> },
}

/// Pure state transition: every store mutation goes through here.
pub fn reduce(state: &CyclesState, action: CycleAction) -> CyclesState {
    match action {
        CycleAction::Create(cycle) => {
            // at most one active cycle: a still-running one is interrupted first
            let mut next = close_active(state, cycle.start_date, CycleStatus::Interrupted);
            next.active_cycle_id = Some(cycle.id.clone());
            next.cycles.push(cycle);
            next
        }
        CycleAction::MarkActiveFinished { at } => close_active(state, at, CycleStatus::Finished),
        CycleAction::InterruptActive { at } => close_active(state, at, CycleStatus::Interrupted),
    }
}

fn close_active(state: &CyclesState, at: DateTime<Utc>, outcome: CycleStatus) -> CyclesState {
    let Some(active_id) = state.active_cycle_id.as_deref() else {
        return state.clone();
    };

    let cycles = state
        .cycles
        .iter()
        .map(|cycle| {
            if cycle.id != active_id || !cycle.is_active() {
                return cycle.clone();
            }
            let at = at.max(cycle.start_date);
            let mut closed = cycle.clone();
            match outcome {
                CycleStatus::Finished => closed.finished_date = Some(at),
                CycleStatus::Interrupted => closed.interrupted_date = Some(at),
                CycleStatus::Active => {}
            }
            closed
        })
        .collect();

    CyclesState {
        cycles,
        active_cycle_id: None,
    }
}

/// Ids are the creation instant in epoch milliseconds, bumped past any id
/// already present.
pub fn next_cycle_id(state: &CyclesState, now: DateTime<Utc>) -> String {
    let mut millis = now.timestamp_millis();
    loop {
        let candidate = millis.to_string();
        if state.cycle(&candidate).is_none() {
            return candidate;
        }
        millis += 1;
    }
}

pub fn format_countdown(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
