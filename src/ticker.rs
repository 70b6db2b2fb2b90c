use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::Cycle;
use crate::storage::KeyValueStore;
use crate::store::CycleStore;

pub const TICK_INTERVAL: StdDuration = StdDuration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TickerState {
    #[default]
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to count down.
    Idle,
    /// A tick is armed but not due yet.
    NotDue,
    Running(u64),
    Completed,
}

/// The one pending tick. Dropping or replacing it cancels the tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickHandle {
    cycle_id: String,
    due_at: Instant,
}

#[cfg(test)]
impl TickHandle {
    pub fn cycle_id(&self) -> &str {
        &self.cycle_id
    }

    pub fn due_at(&self) -> Instant {
        self.due_at
    }
}

/// Whole seconds between the cycle start and `now`, measured on the wall
/// clock so a sleeping or throttled loop never undercounts.
pub fn elapsed_seconds(cycle: &Cycle, now: DateTime<Utc>) -> u64 {
    (now - cycle.start_date).num_seconds().max(0) as u64
}

pub fn evaluate(cycle: &Cycle, now: DateTime<Utc>) -> TickOutcome {
    let elapsed = elapsed_seconds(cycle, now);
    if elapsed >= cycle.target_seconds() {
        TickOutcome::Completed
    } else {
        TickOutcome::Running(elapsed)
    }
}

/// Evaluates the active cycle once, right now. Used at startup so a cycle
/// whose target passed while nothing was running gets finished.
pub fn catch_up<S: KeyValueStore>(store: &mut CycleStore<S>, now: DateTime<Utc>) -> TickOutcome {
    let Some(outcome) = store.active_cycle().map(|cycle| evaluate(cycle, now)) else {
        return TickOutcome::Idle;
    };
    apply(store, outcome, now);
    outcome
}

fn apply<S: KeyValueStore>(store: &mut CycleStore<S>, outcome: TickOutcome, now: DateTime<Utc>) {
    match outcome {
        TickOutcome::Completed => {
            store.mark_active_cycle_finished(now);
            store.reset_active_cycle_tracking();
        }
        TickOutcome::Running(elapsed) => store.set_amount_seconds_passed(elapsed),
        TickOutcome::Idle | TickOutcome::NotDue => {}
    }
}

#[derive(Debug, Default)]
pub struct Ticker {
    handle: Option<TickHandle>,
    state: TickerState,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> TickerState {
        self.state
    }

    #[cfg(test)]
    pub fn handle(&self) -> Option<&TickHandle> {
        self.handle.as_ref()
    }

    /// Re-arms the tick whenever the active cycle changes. Calling it again
    /// for the same cycle keeps the pending tick.
    pub fn sync(&mut self, active: Option<&Cycle>, now: Instant) {
        match (active, &self.handle) {
            (Some(cycle), Some(handle)) if handle.cycle_id == cycle.id => {}
            (Some(cycle), _) => {
                self.cancel();
                debug!(cycle_id = %cycle.id, "tick armed");
                self.handle = Some(TickHandle {
                    cycle_id: cycle.id.clone(),
                    due_at: now + TICK_INTERVAL,
                });
                self.state = TickerState::Running;
            }
            (None, _) => self.cancel(),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(cycle_id = %handle.cycle_id, "tick cancelled");
        }
        self.state = TickerState::Idle;
    }

    /// How long the event loop may block before the next tick is due.
    pub fn time_until_due(&self, now: Instant) -> Option<StdDuration> {
        self.handle
            .as_ref()
            .map(|handle| handle.due_at.saturating_duration_since(now))
    }

    pub fn poll<S: KeyValueStore>(
        &mut self,
        store: &mut CycleStore<S>,
        now: Instant,
        now_utc: DateTime<Utc>,
    ) -> TickOutcome {
        let Some(handle) = &self.handle else {
            // a fired completion settles back to idle on the next poll
            self.state = TickerState::Idle;
            return TickOutcome::Idle;
        };
        if now < handle.due_at {
            return TickOutcome::NotDue;
        }

        let outcome = store
            .active_cycle()
            .filter(|cycle| cycle.id == handle.cycle_id)
            .map(|cycle| evaluate(cycle, now_utc));
        let Some(outcome) = outcome else {
            // active cycle changed under us without a sync
            self.cancel();
            return TickOutcome::Idle;
        };

        apply(store, outcome, now_utc);
        match outcome {
            TickOutcome::Completed => {
                if let Some(handle) = self.handle.take() {
                    info!(cycle_id = %handle.cycle_id, "countdown completed");
                }
                self.state = TickerState::Completed;
            }
            _ => {
                if let Some(handle) = self.handle.as_mut() {
                    handle.due_at = now + TICK_INTERVAL;
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use crate::domain::CycleStatus;
    use crate::storage::MemoryStore;
    use crate::store::CycleStore;

    use super::{TICK_INTERVAL, TickOutcome, Ticker, TickerState, catch_up, evaluate};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()
    }

    fn running_store(minutes: u32) -> CycleStore<MemoryStore> {
        let mut store = CycleStore::open(MemoryStore::new());
        store.create_cycle("Write report", minutes, start()).unwrap();
        store
    }

    #[test]
    fn boundary_between_running_and_completed() {
        let store = running_store(5);
        let cycle = store.active_cycle().unwrap();
        assert_eq!(
            evaluate(cycle, start() + Duration::seconds(299)),
            TickOutcome::Running(299)
        );
        assert_eq!(
            evaluate(cycle, start() + Duration::seconds(300)),
            TickOutcome::Completed
        );
        assert_eq!(
            evaluate(cycle, start() - Duration::seconds(5)),
            TickOutcome::Running(0)
        );
    }

    #[test]
    fn ticks_until_completion_then_stops() {
        let mut store = running_store(5);
        let mut ticker = Ticker::new();
        let base = Instant::now();
        ticker.sync(store.active_cycle(), base);
        assert_eq!(ticker.state(), TickerState::Running);

        assert_eq!(ticker.poll(&mut store, base, start()), TickOutcome::NotDue);

        let first = base + TICK_INTERVAL;
        assert_eq!(
            ticker.poll(&mut store, first, start() + Duration::seconds(299)),
            TickOutcome::Running(299)
        );
        assert_eq!(store.amount_seconds_passed(), 299);
        assert_eq!(store.title(), "00:01 - Write report");

        let second = first + TICK_INTERVAL;
        assert_eq!(
            ticker.poll(&mut store, second, start() + Duration::seconds(300)),
            TickOutcome::Completed
        );
        assert_eq!(ticker.state(), TickerState::Completed);
        assert!(ticker.handle().is_none());
        assert_eq!(store.cycles()[0].status(), CycleStatus::Finished);
        assert!(store.active_cycle_id().is_none());
        assert_eq!(store.amount_seconds_passed(), 0);

        let later = second + TICK_INTERVAL;
        assert_eq!(
            ticker.poll(&mut store, later, start() + Duration::seconds(301)),
            TickOutcome::Idle
        );
        ticker.sync(store.active_cycle(), later);
        assert_eq!(ticker.state(), TickerState::Idle);
    }

    #[test]
    fn completed_settles_to_idle_on_next_poll() {
        let mut store = running_store(5);
        let mut ticker = Ticker::new();
        let base = Instant::now();
        ticker.sync(store.active_cycle(), base);

        let first = base + TICK_INTERVAL;
        assert_eq!(
            ticker.poll(&mut store, first, start() + Duration::seconds(300)),
            TickOutcome::Completed
        );
        assert_eq!(ticker.state(), TickerState::Completed);

        let second = first + TICK_INTERVAL;
        assert_eq!(
            ticker.poll(&mut store, second, start() + Duration::seconds(301)),
            TickOutcome::Idle
        );
        assert_eq!(ticker.state(), TickerState::Idle);
        assert!(ticker.time_until_due(second).is_none());
    }

    #[test]
    fn skipped_ticks_do_not_undercount() {
        let mut store = running_store(25);
        let mut ticker = Ticker::new();
        let base = Instant::now();
        ticker.sync(store.active_cycle(), base);

        // loop slept far past several ticks
        let outcome = ticker.poll(
            &mut store,
            base + TICK_INTERVAL * 40,
            start() + Duration::seconds(1500),
        );
        assert_eq!(outcome, TickOutcome::Completed);
        let cycle = &store.cycles()[0];
        assert_eq!(cycle.finished_date, Some(start() + Duration::seconds(1500)));
        assert!(store.active_cycle_id().is_none());
    }

    #[test]
    fn switching_active_cycle_rearms_handle() {
        let mut store = running_store(25);
        let mut ticker = Ticker::new();
        let base = Instant::now();
        ticker.sync(store.active_cycle(), base);
        let first_id = ticker.handle().unwrap().cycle_id().to_string();

        ticker.sync(store.active_cycle(), base + TICK_INTERVAL / 2);
        assert_eq!(ticker.handle().unwrap().due_at(), base + TICK_INTERVAL);

        store
            .create_cycle("Review", 10, start() + Duration::seconds(1))
            .unwrap();
        let moved = base + TICK_INTERVAL / 2;
        ticker.sync(store.active_cycle(), moved);
        let handle = ticker.handle().unwrap();
        assert_ne!(handle.cycle_id(), first_id);
        assert_eq!(handle.due_at(), moved + TICK_INTERVAL);
    }

    #[test]
    fn interrupt_cancels_pending_tick() {
        let mut store = running_store(25);
        let mut ticker = Ticker::new();
        let base = Instant::now();
        ticker.sync(store.active_cycle(), base);

        store.interrupt_active_cycle(start() + Duration::seconds(100));
        ticker.cancel();
        assert_eq!(ticker.state(), TickerState::Idle);
        assert!(ticker.time_until_due(base).is_none());
        assert_eq!(
            ticker.poll(&mut store, base + TICK_INTERVAL, start() + Duration::seconds(101)),
            TickOutcome::Idle
        );
        assert!(store.cycles()[0].finished_date.is_none());
    }

    #[test]
    fn stale_handle_is_dropped_on_poll() {
        let mut store = running_store(25);
        let mut ticker = Ticker::new();
        let base = Instant::now();
        ticker.sync(store.active_cycle(), base);
        store.interrupt_active_cycle(start() + Duration::seconds(3));

        assert_eq!(
            ticker.poll(&mut store, base + TICK_INTERVAL, start() + Duration::seconds(4)),
            TickOutcome::Idle
        );
        assert!(ticker.handle().is_none());
    }

    #[test]
    fn catch_up_finishes_overdue_cycle() {
        let mut store = running_store(5);
        assert_eq!(
            catch_up(&mut store, start() + Duration::minutes(90)),
            TickOutcome::Completed
        );
        assert_eq!(store.cycles()[0].status(), CycleStatus::Finished);
        assert_eq!(catch_up(&mut store, start()), TickOutcome::Idle);
    }
}
