/// Shown in place of the clock once the countdown has run out.
pub const TIME_UP: &str = "Time is up!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One second elapsed; carries the remaining whole seconds.
    Tick { remaining_s: u32 },
    /// The countdown crossed zero. Reported exactly once per run.
    Finished,
}

/// One-second countdown. The caller owns the clock and calls `tick` once per
/// second; the timer itself is pure state so it can be driven from any loop.
#[derive(Debug, Clone)]
pub struct CountdownTimer {
    initial_s: u32,
    remaining_s: i64,
    state: TimerState,
    finished: bool,
}

impl CountdownTimer {
    pub fn new(initial_s: u32) -> Self {
        Self {
            initial_s,
            remaining_s: i64::from(initial_s),
            state: TimerState::Idle,
            finished: false,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Start the countdown, or resume a paused one. A finished run stays
    /// stopped until `reset`.
    pub fn start(&mut self) {
        if !self.finished {
            self.state = TimerState::Running;
        }
    }

    /// Pause without clearing the remaining time.
    pub fn stop(&mut self) {
        if self.state == TimerState::Running {
            self.state = TimerState::Stopped;
        }
    }

    /// Back to idle with the full configured duration.
    pub fn reset(&mut self) {
        self.state = TimerState::Idle;
        self.remaining_s = i64::from(self.initial_s);
        self.finished = false;
    }

    /// Advance one second. Returns `Finished` on the tick that crosses zero
    /// and nothing at all once the timer has stopped.
    pub fn tick(&mut self) -> Option<TimerEvent> {
        if self.state != TimerState::Running {
            return None;
        }
        self.remaining_s -= 1;
        if self.remaining_s < 0 {
            self.state = TimerState::Stopped;
            self.remaining_s = 0;
            self.finished = true;
            Some(TimerEvent::Finished)
        } else {
            Some(TimerEvent::Tick {
                remaining_s: self.remaining_s as u32,
            })
        }
    }

    pub fn remaining_s(&self) -> u32 {
        self.remaining_s.max(0) as u32
    }

    /// `M:SS` clock text, or the time's-up sentinel after the run ends.
    pub fn display(&self) -> String {
        if self.finished {
            return TIME_UP.to_string();
        }
        let remaining = self.remaining_s.max(0);
        format!("{}:{:02}", remaining / 60, remaining % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finishes_exactly_once_after_n_plus_one_ticks() {
        let mut timer = CountdownTimer::new(3);
        timer.start();
        let mut finishes = 0;
        for i in 0..10 {
            match timer.tick() {
                Some(TimerEvent::Finished) => {
                    finishes += 1;
                    // start(3): ticks 1..=3 count down, tick 4 crosses zero
                    assert_eq!(i, 3);
                }
                Some(TimerEvent::Tick { remaining_s }) => {
                    assert!(remaining_s <= 3);
                }
                None => assert!(i > 3),
            }
        }
        assert_eq!(finishes, 1);
        assert_eq!(timer.state(), TimerState::Stopped);
    }

    #[test]
    fn display_never_goes_below_the_sentinel() {
        let mut timer = CountdownTimer::new(2);
        timer.start();
        for _ in 0..5 {
            timer.tick();
            let text = timer.display();
            assert!(!text.contains('-'), "negative clock: {}", text);
        }
        assert_eq!(timer.display(), TIME_UP);
    }

    #[test]
    fn ticks_are_ignored_unless_running() {
        let mut timer = CountdownTimer::new(5);
        assert_eq!(timer.tick(), None);
        timer.start();
        assert_eq!(timer.tick(), Some(TimerEvent::Tick { remaining_s: 4 }));
        timer.stop();
        assert_eq!(timer.tick(), None);
        assert_eq!(timer.remaining_s(), 4);
    }

    #[test]
    fn reset_restores_the_initial_duration() {
        let mut timer = CountdownTimer::new(120);
        timer.start();
        timer.tick();
        timer.reset();
        assert_eq!(timer.state(), TimerState::Idle);
        assert_eq!(timer.display(), "2:00");
    }

    #[test]
    fn pause_then_resume_keeps_the_remaining_time() {
        let mut timer = CountdownTimer::new(10);
        timer.start();
        timer.tick();
        timer.stop();
        assert_eq!(timer.tick(), None);
        timer.start();
        assert!(timer.is_running());
        assert_eq!(timer.tick(), Some(TimerEvent::Tick { remaining_s: 8 }));
    }

    #[test]
    fn start_is_a_no_op_after_finishing() {
        let mut timer = CountdownTimer::new(1);
        timer.start();
        timer.tick();
        assert_eq!(timer.tick(), Some(TimerEvent::Finished));
        timer.start();
        assert_eq!(timer.tick(), None);
        timer.reset();
        timer.start();
        assert!(timer.is_running());
    }
}
