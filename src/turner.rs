//! Egg turner scheduling
//!
//! Long wait, short turn, repeat: the motor rests for `wait_minutes`, runs
//! for `run_seconds`, and starts the next wait. Intervals come in with
//! every update so the operator can adjust them live; a change rescales the
//! phase in progress so the fraction already served is preserved instead of
//! restarting or instantly expiring the phase.

/// Factory interval defaults.
pub const DEFAULT_WAIT_MINUTES: u16 = 120;
pub const DEFAULT_RUN_SECONDS: u16 = 14;

/// Where the turn cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TurnPhase {
    /// Motor resting between turns.
    #[default]
    Waiting,
    /// Motor on, turning the tray.
    Running,
}

/// Duty-cycle scheduler for the turning motor.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EggTurner {
    wait_minutes: u16,
    run_seconds: u16,
    phase: TurnPhase,
    phase_started_ms: u64,
    initialized: bool,
}

impl Default for EggTurner {
    fn default() -> Self {
        Self::new()
    }
}

impl EggTurner {
    pub fn new() -> Self {
        Self {
            wait_minutes: DEFAULT_WAIT_MINUTES,
            run_seconds: DEFAULT_RUN_SECONDS,
            phase: TurnPhase::Waiting,
            phase_started_ms: 0,
            initialized: false,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Advance the schedule and return the motor command.
    ///
    /// The first call only anchors the cycle: the turner comes up resting
    /// with a full wait ahead of it, never mid-turn. At most one phase
    /// transition happens per call.
    pub fn update(&mut self, now_ms: u64, wait_minutes: u16, run_seconds: u16) -> bool {
        if !self.initialized {
            self.initialized = true;
            self.wait_minutes = wait_minutes;
            self.run_seconds = run_seconds;
            self.phase = TurnPhase::Waiting;
            self.phase_started_ms = now_ms;
            return false;
        }

        if wait_minutes != self.wait_minutes || run_seconds != self.run_seconds {
            self.rescale_phase(now_ms, wait_minutes, run_seconds);
            self.wait_minutes = wait_minutes;
            self.run_seconds = run_seconds;
        }

        let elapsed_ms = now_ms.saturating_sub(self.phase_started_ms);
        match self.phase {
            TurnPhase::Waiting => {
                if elapsed_ms >= self.wait_duration_ms() {
                    self.phase = TurnPhase::Running;
                    self.phase_started_ms = now_ms;
                }
            }
            TurnPhase::Running => {
                if elapsed_ms >= self.run_duration_ms() {
                    self.phase = TurnPhase::Waiting;
                    self.phase_started_ms = now_ms;
                }
            }
        }
        self.phase == TurnPhase::Running
    }

    /// Minutes until the next turn starts, rounded up. Zero while the motor
    /// runs or the wait has already expired.
    pub fn wait_time_left_min(&self, now_ms: u64) -> u16 {
        if self.phase != TurnPhase::Waiting {
            return 0;
        }
        let total = self.wait_duration_ms();
        let elapsed = now_ms.saturating_sub(self.phase_started_ms);
        if elapsed >= total {
            return 0;
        }
        ((total - elapsed + 59_999) / 60_000) as u16
    }

    /// Seconds of motor run remaining, rounded down. While resting this
    /// reports the configured run length of the upcoming turn.
    pub fn run_time_left_s(&self, now_ms: u64) -> u16 {
        match self.phase {
            TurnPhase::Running => {
                let total = self.run_duration_ms();
                let elapsed = now_ms.saturating_sub(self.phase_started_ms);
                (total.saturating_sub(elapsed) / 1_000) as u16
            }
            TurnPhase::Waiting => self.run_seconds,
        }
    }

    /// Move the phase anchor so the fraction of the phase already served
    /// stays the same under the new duration. With the anchor at
    /// `now - elapsed * new/old`, the boundary arrives exactly when the
    /// remaining fraction has been served at the new length.
    fn rescale_phase(&mut self, now_ms: u64, wait_minutes: u16, run_seconds: u16) {
        let (old_total, new_total) = match self.phase {
            TurnPhase::Waiting => (self.wait_duration_ms(), wait_minutes as u64 * 60_000),
            TurnPhase::Running => (self.run_duration_ms(), run_seconds as u64 * 1_000),
        };
        if old_total == 0 {
            self.phase_started_ms = now_ms;
            return;
        }
        let elapsed = now_ms.saturating_sub(self.phase_started_ms).min(old_total);
        let scaled = elapsed * new_total / old_total;
        // an upscale right after boot can push the virtual anchor before
        // time zero; clamping shortens that one wait instead of wrapping
        self.phase_started_ms = now_ms.saturating_sub(scaled);
    }

    fn wait_duration_ms(&self) -> u64 {
        self.wait_minutes as u64 * 60_000
    }

    fn run_duration_ms(&self) -> u64 {
        self.run_seconds as u64 * 1_000
    }
}
