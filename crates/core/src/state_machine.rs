//! Tick-driven state machine runtime.
//!
//! The runtime executes exactly one transition per [`StateMachine::tick`]:
//!
//! ```text
//! tick(now) → StateHandlers::on_tick(now, current, previous) → Step
//! ```
//!
//! The owner of the machine implements [`StateHandlers`] with an exhaustive
//! `match` over its state enum, one arm per state. Handlers are:
//!
//! - **Synchronous**: never block, never await
//! - **Deterministic**: time is passed in by the driver, never read from the
//!   ambient clock
//! - **Prompt**: bounded work per tick; waiting is expressed as a delay hint
//!   on the returned [`Step`], which the machine honours by refusing to run
//!   again until the instant elapses

use std::fmt;
use std::time::{Duration, Instant};

/// Verdict of a state handler: the next state plus an optional delay hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step<S> {
    next: S,
    delay: Option<Duration>,
}

impl<S> Step<S> {
    /// Transition to `next` and be ready to tick again immediately.
    pub fn to(next: S) -> Self {
        Self { next, delay: None }
    }

    /// Transition to `next` and refuse to tick again for `delay`.
    pub fn delay_for(next: S, delay: Duration) -> Self {
        Self {
            next,
            delay: Some(delay),
        }
    }

    /// The next state.
    pub fn next(&self) -> &S {
        &self.next
    }

    /// The delay hint, if any.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }
}

/// Dispatch seam between the runtime and the owner of the states.
///
/// Implementors match exhaustively on `current`; the closed enum makes the
/// compiler verify that every state has a handler.
pub trait StateHandlers<S> {
    /// Run the handler for `current`, returning the transition verdict.
    fn on_tick(&mut self, now: Instant, current: S, previous: S) -> Step<S>;
}

type Observer<S> = Box<dyn FnMut(S, S, Instant) + Send>;

/// A named, tick-driven state machine.
///
/// The machine tracks the current and previous state, honours delay hints
/// and notifies observers after every transition that changes the state.
/// It is single-threaded by contract: callers serialize ticks.
pub struct StateMachine<S> {
    name: &'static str,
    current: S,
    previous: S,
    delay_until: Option<Instant>,
    halted: bool,
    observers: Vec<Observer<S>>,
}

impl<S: Copy + PartialEq + fmt::Debug> StateMachine<S> {
    /// Create a machine in `initial` state.
    pub fn new(name: &'static str, initial: S) -> Self {
        Self {
            name,
            current: initial,
            previous: initial,
            delay_until: None,
            halted: false,
            observers: Vec::new(),
        }
    }

    /// The machine's name, used in log output.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The current state.
    pub fn state(&self) -> S {
        self.current
    }

    /// The state the machine was in before the last transition.
    pub fn previous_state(&self) -> S {
        self.previous
    }

    /// Register an observer invoked with `(current, previous, now)` after
    /// every transition that changes the state.
    pub fn on_state_change(&mut self, observer: impl FnMut(S, S, Instant) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Time remaining until the machine will run again, if a delay hint is
    /// pending.
    pub fn delay_remaining(&self, now: Instant) -> Option<Duration> {
        self.delay_until
            .and_then(|until| until.checked_duration_since(now))
            .filter(|remaining| !remaining.is_zero())
    }

    /// True once the machine has been reset for teardown.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Run at most one handler.
    ///
    /// Returns `false` without running anything when the machine is halted
    /// or a delay hint has not yet elapsed.
    pub fn tick<H>(&mut self, now: Instant, handlers: &mut H) -> bool
    where
        H: StateHandlers<S> + ?Sized,
    {
        if self.halted {
            return false;
        }

        if let Some(until) = self.delay_until {
            if now < until {
                return false;
            }
            self.delay_until = None;
        }

        let step = handlers.on_tick(now, self.current, self.previous);
        let next = *step.next();

        if let Some(delay) = step.delay() {
            self.delay_until = Some(now + delay);
        }

        let entered_new_state = next != self.current;
        self.previous = self.current;
        self.current = next;

        if entered_new_state {
            tracing::trace!(
                machine = self.name,
                current = ?self.current,
                previous = ?self.previous,
                "state transition"
            );
            for observer in &mut self.observers {
                observer(self.current, self.previous, now);
            }
        }

        true
    }

    /// Force the machine into a terminal no-op state for teardown.
    ///
    /// Outstanding delay hints are cancelled and subsequent ticks do
    /// nothing.
    pub fn reset(&mut self) {
        self.halted = true;
        self.delay_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Phase {
        Idle,
        Working,
        Done,
    }

    struct Driver {
        ticks: usize,
        delay_on_working: bool,
    }

    impl StateHandlers<Phase> for Driver {
        fn on_tick(&mut self, _now: Instant, current: Phase, _previous: Phase) -> Step<Phase> {
            self.ticks += 1;
            match current {
                Phase::Idle => Step::to(Phase::Working),
                Phase::Working => {
                    if self.delay_on_working {
                        Step::delay_for(Phase::Done, Duration::from_millis(50))
                    } else {
                        Step::to(Phase::Done)
                    }
                }
                Phase::Done => Step::to(Phase::Done),
            }
        }
    }

    #[test]
    fn test_tick_advances_and_tracks_previous() {
        let mut machine = StateMachine::new("test", Phase::Idle);
        let mut driver = Driver {
            ticks: 0,
            delay_on_working: false,
        };
        let now = Instant::now();

        assert!(machine.tick(now, &mut driver));
        assert_eq!(machine.state(), Phase::Working);
        assert_eq!(machine.previous_state(), Phase::Idle);

        assert!(machine.tick(now, &mut driver));
        assert_eq!(machine.state(), Phase::Done);
        assert_eq!(machine.previous_state(), Phase::Working);
    }

    #[test]
    fn test_delay_hint_blocks_until_elapsed() {
        let mut machine = StateMachine::new("test", Phase::Working);
        let mut driver = Driver {
            ticks: 0,
            delay_on_working: true,
        };
        let start = Instant::now();

        assert!(machine.tick(start, &mut driver));
        assert_eq!(machine.state(), Phase::Done);
        assert_eq!(driver.ticks, 1);

        // Too early: the handler must not run.
        assert!(!machine.tick(start + Duration::from_millis(10), &mut driver));
        assert_eq!(driver.ticks, 1);
        assert!(machine.delay_remaining(start).is_some());

        // Once the hint elapses the machine runs again.
        assert!(machine.tick(start + Duration::from_millis(50), &mut driver));
        assert_eq!(driver.ticks, 2);
        assert_eq!(machine.delay_remaining(start + Duration::from_millis(50)), None);
    }

    #[test]
    fn test_reset_is_terminal_and_cancels_delays() {
        let mut machine = StateMachine::new("test", Phase::Working);
        let mut driver = Driver {
            ticks: 0,
            delay_on_working: true,
        };
        let now = Instant::now();

        assert!(machine.tick(now, &mut driver));
        machine.reset();

        assert!(machine.is_halted());
        assert_eq!(machine.delay_remaining(now), None);
        assert!(!machine.tick(now + Duration::from_secs(1), &mut driver));
        assert_eq!(driver.ticks, 1);
    }

    #[test]
    fn test_observer_fires_only_on_change() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let changes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&changes);

        let mut machine = StateMachine::new("test", Phase::Done);
        machine.on_state_change(move |_, _, _| {
            seen.fetch_add(1, Ordering::Relaxed);
        });

        let mut driver = Driver {
            ticks: 0,
            delay_on_working: false,
        };
        let now = Instant::now();

        // Done -> Done: no change, no notification.
        assert!(machine.tick(now, &mut driver));
        assert_eq!(changes.load(Ordering::Relaxed), 0);

        let mut machine = StateMachine::new("test", Phase::Idle);
        let seen = Arc::clone(&changes);
        machine.on_state_change(move |current, previous, _| {
            assert_ne!(current, previous);
            seen.fetch_add(1, Ordering::Relaxed);
        });

        assert!(machine.tick(now, &mut driver));
        assert_eq!(changes.load(Ordering::Relaxed), 1);
    }
}
