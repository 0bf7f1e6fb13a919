// The 1 Hz clock that drives phase and reserve countdowns.
//
// `TimerDriver` owns the tokio interval and is armed/disarmed by the event
// loop after every state change. `advance` applies one tick to the draft and
// fires the forced auto-selection when both clocks of the acting team are
// spent.

use std::time::Duration;

use rand::Rng;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::order::Turn;
use super::state::{Countdown, DraftState, Rejection};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// What a single tick did to the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The clock is stopped; nothing changed.
    Idle,
    Countdown(Countdown),
    /// Both clocks ran out and a random character resolved the turn.
    AutoSelected { turn: Turn, character: String },
    /// Both clocks ran out with nothing left to choose.
    Stalled,
}

/// Apply one second to `draft`.
pub fn advance<R: Rng + ?Sized>(draft: &mut DraftState, rng: &mut R) -> TickOutcome {
    let Some(countdown) = draft.tick() else {
        return TickOutcome::Idle;
    };
    resolve_expiry(draft, rng).unwrap_or(TickOutcome::Countdown(countdown))
}

/// Fire the forced selection if the acting team is out of time. Called after
/// every tick and after any command that can leave both clocks at zero
/// (undo, settings changes).
pub fn resolve_expiry<R: Rng + ?Sized>(draft: &mut DraftState, rng: &mut R) -> Option<TickOutcome> {
    if !draft.auto_select_due() {
        return None;
    }
    let turn = draft.current_turn()?;
    match draft.auto_select(rng) {
        Ok(character) => Some(TickOutcome::AutoSelected { turn, character }),
        Err(Rejection::PoolExhausted) => Some(TickOutcome::Stalled),
        Err(e) => {
            warn!("auto-select at step {} refused: {}", draft.current_step(), e);
            None
        }
    }
}

/// Owns the repeating tick. Re-arming starts a fresh one-second period, so
/// pause/resume restarts the alignment rather than resuming it.
#[derive(Debug, Default)]
pub struct TimerDriver {
    interval: Option<Interval>,
}

impl TimerDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.interval.is_some()
    }

    /// Arm the tick source when `should_run` and it is not running; tear it
    /// down when not `should_run`. Returns true if anything changed.
    pub fn sync(&mut self, should_run: bool) -> bool {
        match (should_run, self.interval.is_some()) {
            (true, false) => {
                let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.interval = Some(interval);
                debug!("draft clock armed");
                true
            }
            (false, true) => {
                self.interval = None;
                debug!("draft clock disarmed");
                true
            }
            _ => false,
        }
    }

    /// Wait for the next tick. Never completes while disarmed, so it is safe
    /// to poll from `tokio::select!` unconditionally.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
