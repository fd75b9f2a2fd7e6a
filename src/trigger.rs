//! Trigger state machines of the oscilloscope and of the logic analyzer.
//!
//! Both are pure transition functions from `(state, event)` to `(state, actions)`. They are
//! called from interrupt handlers (watchdog hit, logic sample, countdown elapsed) and from the
//! scheduler (buffer progress), and the caller performs the returned actions on the hardware.

use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Acquisition phase, common to both subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Free-running (oscilloscope) or idle (logic analyzer).
    #[default]
    NoTrigger,
    /// Armed, waiting for an edge.
    PreTrigger,
    /// Edge seen, capturing the post-trigger window.
    Triggered,
    /// Capture stopped, streaming the buffer to the host.
    PostTrigger,
}

/// Progress of the two-stage watchdog confirmation while armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confirm {
    #[default]
    Idle,
    /// The coarse (offset) window fired; a narrow window hit now confirms the edge direction.
    Coarse,
    /// Both windows fired in order; the scheduler commits to the trigger on its next poll.
    Confirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeState {
    #[default]
    NoTrigger,
    PreTrigger(Confirm),
    Triggered,
    PostTrigger,
}

impl ScopeState {
    pub fn phase(self) -> Phase {
        match self {
            ScopeState::NoTrigger     => Phase::NoTrigger,
            ScopeState::PreTrigger(_) => Phase::PreTrigger,
            ScopeState::Triggered     => Phase::Triggered,
            ScopeState::PostTrigger   => Phase::PostTrigger,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Actions: u8 {
        /// A window of samples may be sent.
        const MARK_READY      = 1<<0;
        /// Clear the buffer and restart capture from the beginning.
        const RESTART         = 1<<1;
        /// Stop capture.
        const STOP            = 1<<2;
        /// Zero the stream cursor and the sample counters.
        const RESET_COUNTERS  = 1<<3;
        /// Mask the watchdog interrupt line of the trigger source.
        const MASK_WATCHDOG   = 1<<4;
        /// Unmask the watchdog interrupt line after the settle delay.
        const REARM_WATCHDOG  = 1<<5;
        /// Start the one-shot post-trigger countdown.
        const START_COUNTDOWN = 1<<6;
    }
}

/// Buffer progress as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Next sample to stream.
    pub cursor: usize,
    /// Samples known to be in the buffer.
    pub shadow: usize,
    pub capacity: usize,
    /// Samples to acquire after the trigger.
    pub post_trigger: usize,
    /// A command is being handled.
    pub paused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEvent {
    Poll(Progress),
    WatchdogCoarse,
    WatchdogNarrow,
}

pub fn scope_step(state: ScopeState, event: ScopeEvent) -> (ScopeState, Actions) {
    use ScopeState::*;
    match (state, event) {
        (NoTrigger, ScopeEvent::Poll(p)) => {
            if p.cursor >= p.capacity {
                (NoTrigger, Actions::RESTART)
            } else if p.shadow > p.cursor && !p.paused {
                (NoTrigger, Actions::MARK_READY)
            } else {
                (NoTrigger, Actions::empty())
            }
        }

        (PreTrigger(Confirm::Idle), ScopeEvent::WatchdogCoarse) |
        (PreTrigger(Confirm::Coarse), ScopeEvent::WatchdogCoarse) =>
            (PreTrigger(Confirm::Coarse), Actions::empty()),
        (PreTrigger(Confirm::Coarse), ScopeEvent::WatchdogNarrow) =>
            (PreTrigger(Confirm::Confirmed), Actions::MASK_WATCHDOG),
        (PreTrigger(Confirm::Confirmed), ScopeEvent::Poll(_)) =>
            (Triggered, Actions::RESET_COUNTERS),

        (Triggered, ScopeEvent::Poll(p)) if p.shadow >= p.post_trigger =>
            (PostTrigger, Actions::STOP),

        (PostTrigger, ScopeEvent::Poll(p)) => {
            if p.cursor >= p.capacity {
                (PreTrigger(Confirm::Idle), Actions::RESTART | Actions::REARM_WATCHDOG)
            } else if !p.paused {
                (PostTrigger, Actions::MARK_READY)
            } else {
                (PostTrigger, Actions::empty())
            }
        }

        // narrow window hit without a coarse one first: the signal crossed the level in
        // the other direction
        (state, _) => (state, Actions::empty()),
    }
}

/// Edge condition on the sampled logic port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogicTrigger {
    pub mask: u16,
    /// `None` if the edge code was not recognized; such a trigger never fires.
    pub edge: Option<Edge>,
}

impl LogicTrigger {
    pub fn new(mask: u16, edge_code: u16) -> Self {
        let edge = match edge_code {
            0 => Some(Edge::Falling),
            1 => Some(Edge::Rising),
            _ => None,
        };
        LogicTrigger { mask, edge }
    }

    pub fn matches(&self, previous: u16, current: u16) -> bool {
        let (previous, current) = (previous & self.mask, current & self.mask);
        match self.edge {
            Some(Edge::Rising)  => previous == 0 && current != 0,
            Some(Edge::Falling) => previous != 0 && current == 0,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicEvent {
    Sample { previous: u16, current: u16 },
    CountdownElapsed,
    Poll { cursor: usize, capacity: usize },
}

pub fn logic_step(phase: Phase, trigger: &LogicTrigger, event: LogicEvent) -> (Phase, Actions) {
    match (phase, event) {
        (Phase::PreTrigger, LogicEvent::Sample { previous, current })
                if trigger.matches(previous, current) =>
            (Phase::Triggered, Actions::START_COUNTDOWN),

        (Phase::Triggered, LogicEvent::CountdownElapsed) =>
            (Phase::PostTrigger, Actions::STOP | Actions::RESET_COUNTERS),

        (Phase::PostTrigger, LogicEvent::Poll { cursor, capacity }) => {
            if cursor >= capacity {
                (Phase::PreTrigger, Actions::RESTART)
            } else {
                (Phase::PostTrigger, Actions::MARK_READY)
            }
        }

        (phase, _) => (phase, Actions::empty()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use super::ScopeState::*;

    macro_rules! assert_step {
        ($state:expr, $event:expr => $after:expr; $( $action:ident )|*) => {
            assert_eq!(scope_step($state, $event),
                       ($after, Actions::empty() $( | Actions::$action )*));
        };
        ($phase:expr, $trig:expr, $event:expr => $after:expr; $( $action:ident )|*) => {
            assert_eq!(logic_step($phase, &$trig, $event),
                       ($after, Actions::empty() $( | Actions::$action )*));
        };
    }

    fn poll(cursor: usize, shadow: usize) -> ScopeEvent {
        ScopeEvent::Poll(Progress { cursor, shadow, capacity: 1000, post_trigger: 100, paused: false })
    }

    fn poll_paused(cursor: usize, shadow: usize) -> ScopeEvent {
        ScopeEvent::Poll(Progress { cursor, shadow, capacity: 1000, post_trigger: 100, paused: true })
    }

    #[test]
    fn test_free_run_ready() {
        assert_step!(NoTrigger, poll(0, 100) => NoTrigger; MARK_READY);
        assert_step!(NoTrigger, poll(100, 100) => NoTrigger;);
        assert_step!(NoTrigger, poll_paused(0, 100) => NoTrigger;);
    }

    #[test]
    fn test_free_run_wraps_at_capacity() {
        assert_step!(NoTrigger, poll(1000, 1000) => NoTrigger; RESTART);
        assert_step!(NoTrigger, poll_paused(1000, 1000) => NoTrigger; RESTART);
        assert_step!(NoTrigger, poll(992, 1000) => NoTrigger; MARK_READY);
    }

    #[test]
    fn test_two_stage_confirmation() {
        let state = PreTrigger(Confirm::Idle);
        assert_step!(state, ScopeEvent::WatchdogCoarse => PreTrigger(Confirm::Coarse););
        let state = PreTrigger(Confirm::Coarse);
        assert_step!(state, ScopeEvent::WatchdogNarrow => PreTrigger(Confirm::Confirmed); MASK_WATCHDOG);
        let state = PreTrigger(Confirm::Confirmed);
        assert_step!(state, poll(400, 500) => Triggered; RESET_COUNTERS);
    }

    #[test]
    fn test_narrow_alone_does_not_trigger() {
        let state = PreTrigger(Confirm::Idle);
        assert_step!(state, ScopeEvent::WatchdogNarrow => PreTrigger(Confirm::Idle););
        assert_step!(state, poll(0, 500) => PreTrigger(Confirm::Idle););
    }

    #[test]
    fn test_confirmed_ignores_more_hits() {
        let state = PreTrigger(Confirm::Confirmed);
        assert_step!(state, ScopeEvent::WatchdogCoarse => state;);
        assert_step!(state, ScopeEvent::WatchdogNarrow => state;);
    }

    #[test]
    fn test_post_trigger_window() {
        assert_step!(Triggered, poll(0, 0) => Triggered;);
        assert_step!(Triggered, poll(0, 99) => Triggered;);
        assert_step!(Triggered, poll(0, 100) => PostTrigger; STOP);
    }

    #[test]
    fn test_post_trigger_streams_then_rearms() {
        assert_step!(PostTrigger, poll(8, 100) => PostTrigger; MARK_READY);
        assert_step!(PostTrigger, poll_paused(8, 100) => PostTrigger;);
        assert_step!(PostTrigger, poll(1000, 100) => PreTrigger(Confirm::Idle); RESTART | REARM_WATCHDOG);
    }

    #[test]
    fn test_logic_trigger_edges() {
        let rising = LogicTrigger::new(0b100, 1);
        assert!(rising.matches(0b011, 0b100));
        assert!(!rising.matches(0b100, 0b100));
        assert!(!rising.matches(0b000, 0b011));
        let falling = LogicTrigger::new(0b100, 0);
        assert!(falling.matches(0b111, 0b011));
        assert!(!falling.matches(0b011, 0b011));
        let unknown = LogicTrigger::new(0xffff, 7);
        assert!(!unknown.matches(0, 0xffff));
        assert!(!unknown.matches(0xffff, 0));
    }

    #[test]
    fn test_logic_sequence() {
        let trig = LogicTrigger::new(0x01, 1);
        let sample = |previous, current| LogicEvent::Sample { previous, current };
        assert_step!(Phase::PreTrigger, trig, sample(0, 0) => Phase::PreTrigger;);
        assert_step!(Phase::PreTrigger, trig, sample(0, 1) => Phase::Triggered; START_COUNTDOWN);
        assert_step!(Phase::Triggered, trig, sample(1, 0) => Phase::Triggered;);
        assert_step!(Phase::Triggered, trig, LogicEvent::CountdownElapsed =>
                     Phase::PostTrigger; STOP | RESET_COUNTERS);
        assert_step!(Phase::PostTrigger, trig, LogicEvent::Poll { cursor: 8, capacity: 16 } =>
                     Phase::PostTrigger; MARK_READY);
        assert_step!(Phase::PostTrigger, trig, LogicEvent::Poll { cursor: 16, capacity: 16 } =>
                     Phase::PreTrigger; RESTART);
    }

    #[test]
    fn test_logic_idle_ignores_everything() {
        let trig = LogicTrigger::new(0xff, 1);
        assert_step!(Phase::NoTrigger, trig, LogicEvent::Sample { previous: 0, current: 1 } =>
                     Phase::NoTrigger;);
        assert_step!(Phase::NoTrigger, trig, LogicEvent::CountdownElapsed => Phase::NoTrigger;);
        assert_step!(Phase::NoTrigger, trig, LogicEvent::Poll { cursor: 0, capacity: 8 } =>
                     Phase::NoTrigger;);
    }
}
