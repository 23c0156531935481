use crate::keypad::{Key, Keypad, BACKSPACE_LABEL};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default pause after the last key press before the pending character commits.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(450);

/// Handle of a scheduled commit-on-timeout. Ids come from a monotonic
/// generation counter, so an id never repeats within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(pub u64);

/// Input to the typing state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    KeyPress(Key),
    Backspace,
    /// Raised by the host when the debounce timer with this id elapses.
    TimeoutFired(TimerId),
}

impl Signal {
    /// Translate a raw key-down label. Unrecognized labels yield None and
    /// must be ignored by the caller.
    pub fn from_label(label: &str) -> Option<Signal> {
        if label == BACKSPACE_LABEL {
            return Some(Signal::Backspace);
        }
        Key::from_label(label).map(Signal::KeyPress)
    }
}

/// What the host must do with its debounce timer after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Leave any outstanding timer alone.
    None,
    /// Cancel the outstanding timer.
    Cancel(TimerId),
    /// Cancel the outstanding timer (if any), then schedule `start`.
    Restart {
        cancel: Option<TimerId>,
        start: TimerId,
    },
}

/// Everything the typing session knows. Idle when `active_key` is None.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingState {
    pub message: String,
    pub is_composing: bool,
    pub active_key: Option<Key>,
    /// Position in `active_key`'s candidates; None when no cycle is active.
    pub cycle_index: Option<usize>,
    pub pending_char: Option<char>,
    pub pending_timer: Option<TimerId>,
}

impl TypingState {
    /// Committed text followed by the pending character, if any.
    pub fn composed_text(&self) -> String {
        let mut text = self.message.clone();
        text.extend(self.pending_char);
        text
    }

    /// Text as a display shows it: composed text followed by the caret marker.
    pub fn render(&self, caret: &str) -> String {
        let mut text = self.composed_text();
        text.push_str(caret);
        text
    }

    fn idle(message: String) -> Self {
        Self {
            message,
            ..Self::default()
        }
    }

    fn composing(message: String, key: Key, index: usize, ch: char, timer: TimerId) -> Self {
        Self {
            message,
            is_composing: true,
            active_key: Some(key),
            cycle_index: Some(index),
            pending_char: Some(ch),
            pending_timer: Some(timer),
        }
    }
}

/// Pure transition function. Returns None when the signal is ignored (no
/// state change, nothing to emit). `next_timer` is the id to use if the
/// transition starts a new debounce timer.
pub fn transition(
    keypad: &Keypad,
    state: &TypingState,
    signal: Signal,
    next_timer: TimerId,
) -> Option<(TypingState, TimerAction)> {
    match signal {
        Signal::KeyPress(key) => {
            let chars = keypad.candidates_for(key);
            let restart = TimerAction::Restart {
                cancel: state.pending_timer,
                start: next_timer,
            };

            let next = match (state.active_key, state.cycle_index) {
                // Same key again: advance the cycle.
                (Some(active), Some(index)) if active == key => {
                    let index = (index + 1) % chars.len();
                    TypingState::composing(state.message.clone(), key, index, chars[index], next_timer)
                }
                // Different key: commit what was pending, start over on the new key.
                (Some(_), _) => {
                    let mut message = state.message.clone();
                    message.extend(state.pending_char);
                    TypingState::composing(message, key, 0, chars[0], next_timer)
                }
                (None, _) => TypingState::composing(state.message.clone(), key, 0, chars[0], next_timer),
            };
            Some((next, restart))
        }
        Signal::Backspace => {
            if let Some(timer) = state.pending_timer.filter(|_| state.is_composing) {
                // Abandon the composition; the pending char never reached the message.
                return Some((TypingState::idle(state.message.clone()), TimerAction::Cancel(timer)));
            }
            let mut message = state.message.clone();
            message.pop();
            Some((TypingState::idle(message), TimerAction::None))
        }
        Signal::TimeoutFired(id) => {
            if !state.is_composing || state.pending_timer != Some(id) {
                return None;
            }
            let mut message = state.message.clone();
            message.extend(state.pending_char);
            Some((TypingState::idle(message), TimerAction::None))
        }
    }
}

/// Owns one typing session: the state, the key table, the debounce delay and
/// the deadline of the single outstanding timer.
#[derive(Debug, Clone)]
pub struct TypingMachine {
    keypad: Keypad,
    debounce: Duration,
    state: TypingState,
    generation: u64,
    deadline: Option<(TimerId, Instant)>,
}

impl TypingMachine {
    pub fn new(keypad: Keypad, debounce: Duration) -> Self {
        Self {
            keypad,
            debounce,
            state: TypingState::default(),
            generation: 0,
            deadline: None,
        }
    }

    pub fn state(&self) -> &TypingState {
        &self.state
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Apply a signal. Returns the timer action the transition implies, or
    /// None if the signal was ignored.
    pub fn handle_signal(&mut self, signal: Signal, now: Instant) -> Option<TimerAction> {
        let next_timer = TimerId(self.generation + 1);
        let (state, action) = transition(&self.keypad, &self.state, signal, next_timer)?;

        match action {
            TimerAction::Restart { start, .. } => {
                self.generation = start.0;
                self.deadline = Some((start, now + self.debounce));
            }
            TimerAction::Cancel(_) => self.deadline = None,
            TimerAction::None => {
                if state.pending_timer.is_none() {
                    self.deadline = None;
                }
            }
        }

        debug!(
            ?signal,
            message = %state.message,
            pending = ?state.pending_char,
            composing = state.is_composing,
            "typing transition"
        );
        self.state = state;
        Some(action)
    }

    /// Apply a raw key-down label. Unrecognized labels are ignored.
    pub fn handle_label(&mut self, label: &str, now: Instant) -> Option<TimerAction> {
        let signal = Signal::from_label(label)?;
        self.handle_signal(signal, now)
    }

    /// Deliver a timeout for `id` regardless of its deadline. Returns true if
    /// it committed a character; a stale id is ignored.
    pub fn fire_timeout(&mut self, id: TimerId) -> bool {
        self.handle_signal(Signal::TimeoutFired(id), Instant::now()).is_some()
    }

    /// When `check_timer()` next needs to run, or None if nothing is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline.map(|(_, at)| at)
    }

    /// Fire the outstanding timer if its deadline has passed. Returns true if
    /// a character was committed.
    pub fn check_timer(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some((id, at)) if now >= at => {
                debug!(timer = id.0, "debounce elapsed");
                self.handle_signal(Signal::TimeoutFired(id), now).is_some()
            }
            _ => false,
        }
    }
}

impl Default for TypingMachine {
    fn default() -> Self {
        Self::new(Keypad::builtin(), DEFAULT_DEBOUNCE)
    }
}
