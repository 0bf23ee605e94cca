//! Heater PID with mode state machine
//!
//! Positional PID on the ×100 temperature scale. The controller runs in one
//! of three modes: `Off` (actuator pinned off), `Manual` (closed loop with
//! an operator arm/disarm flag) and `AutoTune` (relay feedback owns the
//! actuator until it finishes or gives up). Every mode change opens a short
//! stabilization window during which the loop does nothing at all, so a
//! half-updated state never drives the heater.

use super::autotune::Autotuner;
use super::fixed::Fixed32;
use crate::config::limits;

/// Minimum spacing between PID steps.
const SAMPLE_TIME_MS: u64 = 100;
/// Quiet period after any mode change.
pub const STABILIZATION_MS: u64 = 2_000;
/// Upper bound on the integration interval after a long gap.
const MAX_DT_MS: u64 = 10_000;
/// Error at or above which the heater is driven regardless of the PID
/// output (×100).
const ACTIVATION_ERROR_X100: i16 = 30;

/// Operating mode of the heater loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlMode {
    /// Actuator off, loop idle.
    Off,
    /// Closed-loop control; the operator arms or disarms the output.
    Manual,
    /// Relay-feedback tune in progress; the tuner owns the actuator.
    AutoTune,
}

/// Proportional, integral and derivative gains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidGains {
    pub kp: Fixed32,
    pub ki: Fixed32,
    pub kd: Fixed32,
}

impl Default for PidGains {
    /// Conservative gains for a small still-air incubator.
    fn default() -> Self {
        Self {
            kp: Fixed32::from_int(10),
            ki: Fixed32::from_scaled_100(10),
            kd: Fixed32::from_int(5),
        }
    }
}

/// Heater temperature controller.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidController {
    mode: ControlMode,
    gains: PidGains,
    setpoint_x100: i16,
    /// Operator arm flag; meaningful in `Manual` only.
    active: bool,

    integral: Fixed32,
    output: Fixed32,
    last_input_x100: Option<i16>,
    last_error_x100: i16,
    last_compute_ms: u64,
    mode_changed_at_ms: u64,

    tuner: Autotuner,
}

impl Default for PidController {
    fn default() -> Self {
        Self::new()
    }
}

impl PidController {
    /// Starts in `Manual`, disarmed, at the 37.5 default setpoint.
    pub fn new() -> Self {
        Self {
            mode: ControlMode::Manual,
            gains: PidGains::default(),
            setpoint_x100: 3750,
            active: false,
            integral: Fixed32::ZERO,
            output: Fixed32::ZERO,
            last_input_x100: None,
            last_error_x100: 0,
            last_compute_ms: 0,
            mode_changed_at_ms: 0,
            tuner: Autotuner::new(),
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn setpoint_x100(&self) -> i16 {
        self.setpoint_x100
    }

    /// Operator arm flag. Not the actuator state; see [`is_output_active`].
    ///
    /// [`is_output_active`]: Self::is_output_active
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Unclamped view of the last computed output, 0..=1.
    pub fn output(&self) -> Fixed32 {
        self.output
    }

    /// Setpoint minus measurement from the last update (×100).
    pub fn last_error_x100(&self) -> i16 {
        self.last_error_x100
    }

    pub fn tuner(&self) -> &Autotuner {
        &self.tuner
    }

    /// Replace all three gains, or none: any negative value rejects the
    /// whole set.
    pub fn set_gains(&mut self, kp: Fixed32, ki: Fixed32, kd: Fixed32) -> bool {
        if kp.is_negative() || ki.is_negative() || kd.is_negative() {
            return false;
        }
        self.gains = PidGains { kp, ki, kd };
        true
    }

    /// Setpoint in the controllable range; out-of-range values are rejected
    /// and the previous setpoint stays in force.
    pub fn set_setpoint(&mut self, setpoint_x100: i16) -> bool {
        if !limits::valid_temperature_setpoint(setpoint_x100) {
            return false;
        }
        self.setpoint_x100 = setpoint_x100;
        true
    }

    /// Arm or disarm the manual loop. Rejected outside `Manual`.
    pub fn set_active(&mut self, active: bool) -> bool {
        if self.mode != ControlMode::Manual {
            return false;
        }
        self.active = active;
        true
    }

    /// Switch modes. Same-mode calls are a no-op; a real change resets the
    /// loop state and opens the stabilization window.
    pub fn set_mode(&mut self, mode: ControlMode, now_ms: u64) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        self.mode_changed_at_ms = now_ms;
        self.integral = Fixed32::ZERO;
        self.output = Fixed32::ZERO;
        self.last_input_x100 = None;
        self.last_error_x100 = 0;
        self.last_compute_ms = now_ms;

        match mode {
            ControlMode::Off => {
                self.active = false;
                // only a run in progress needs stopping; a finished result
                // stays readable for the status reports
                if self.tuner.is_active() {
                    self.tuner.cancel();
                }
            }
            ControlMode::Manual => {
                self.active = true;
                if self.tuner.is_active() {
                    self.tuner.cancel();
                }
            }
            ControlMode::AutoTune => {
                self.tuner.start(self.setpoint_x100, now_ms);
            }
        }
    }

    /// One loop step. Call with every fresh temperature sample.
    ///
    /// Inside the stabilization window this does nothing. Otherwise the
    /// error is refreshed on every call while the actual PID step runs at
    /// most once per sample interval, with the integration interval capped
    /// so a long outage cannot dump a huge impulse into the integral.
    pub fn compute(&mut self, input_x100: i16, now_ms: u64) {
        if now_ms.saturating_sub(self.mode_changed_at_ms) < STABILIZATION_MS {
            return;
        }

        self.last_error_x100 =
            ((self.setpoint_x100 as i32 - input_x100 as i32).clamp(i16::MIN as i32, i16::MAX as i32))
                as i16;

        match self.mode {
            ControlMode::Off => {
                self.output = Fixed32::ZERO;
            }
            ControlMode::AutoTune => {
                self.tuner.update(input_x100, now_ms);
                if self.tuner.is_finished() {
                    if let Some(result) = self.tuner.result() {
                        self.gains = result.gains;
                    }
                    self.set_mode(ControlMode::Manual, now_ms);
                } else if self.tuner.is_canceled() {
                    // timeout or degenerate identification: back to manual
                    // control on the previous gains
                    self.set_mode(ControlMode::Manual, now_ms);
                }
            }
            ControlMode::Manual => {
                if self.active {
                    self.step(input_x100, now_ms);
                }
            }
        }
    }

    /// Actuator command for this loop.
    ///
    /// While tuning this mirrors the relay. In armed manual mode the heater
    /// runs when the PID asks for more than half power or the error is
    /// still above the activation threshold, whichever comes first.
    pub fn is_output_active(&self) -> bool {
        match self.mode {
            ControlMode::Off => false,
            ControlMode::AutoTune => self.tuner.relay_on(),
            ControlMode::Manual => {
                self.active
                    && (self.last_error_x100 >= ACTIVATION_ERROR_X100
                        || self.output > Fixed32::HALF)
            }
        }
    }

    /// Mode as the display collaborators print it.
    pub fn mode_label(&self) -> &'static str {
        match self.mode {
            ControlMode::Off => "off",
            ControlMode::AutoTune => "autotune",
            ControlMode::Manual if self.active => "manual (active)",
            ControlMode::Manual => "manual (standby)",
        }
    }

    /// Abort an in-progress tune and fall back to manual control on the
    /// previous gains. No-op in other modes.
    pub fn cancel_tune(&mut self, now_ms: u64) {
        if self.mode == ControlMode::AutoTune {
            self.set_mode(ControlMode::Manual, now_ms);
        }
    }

    /// The positional PID step, gated to the sample interval.
    fn step(&mut self, input_x100: i16, now_ms: u64) {
        let since_last_ms = now_ms.saturating_sub(self.last_compute_ms);
        if since_last_ms < SAMPLE_TIME_MS {
            return;
        }
        let dt = Fixed32::from_scaled_1000(since_last_ms.min(MAX_DT_MS) as i32);

        let error = Fixed32::from_scaled_100(self.last_error_x100 as i32);

        // integral carries the ki*dt product so gain changes take effect
        // immediately, clamped to the output range as anti-windup
        self.integral = self
            .integral
            .saturating_add(self.gains.ki.mul(error).mul(dt))
            .clamp(Fixed32::ZERO, Fixed32::ONE);

        // derivative on measurement, immune to setpoint steps
        let derivative = match self.last_input_x100 {
            Some(last) => {
                let dinput = Fixed32::from_scaled_100(input_x100 as i32 - last as i32);
                self.gains.kd.mul(dinput).div(dt)
            }
            None => Fixed32::ZERO,
        };

        self.output = (self.gains.kp.mul(error).saturating_add(self.integral) - derivative)
            .clamp(Fixed32::ZERO, Fixed32::ONE);

        self.last_input_x100 = Some(input_x100);
        self.last_compute_ms = now_ms;
    }
}
