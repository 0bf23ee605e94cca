//! On/off humidity control with a deadband
//!
//! The humidifier is a plain relay, so humidity runs on latched hysteresis
//! rather than PID: switch on at the low limit, off at the high limit, and
//! hold state anywhere in between. The component is pure and total — range
//! policy for setpoint and thresholds lives with the caller.

/// Default humidity setpoint, ×100 (%RH).
pub const DEFAULT_HUMIDITY_X100: i16 = 6000;
/// Default low threshold magnitude, ×100.
pub const DEFAULT_LOW_THRESHOLD_X100: i16 = 500;
/// Default high threshold magnitude, ×100.
pub const DEFAULT_HIGH_THRESHOLD_X100: i16 = 200;

/// Latched deadband controller.
///
/// `low_limit = setpoint - low_threshold` and
/// `high_limit = setpoint + high_threshold` are cached on every setter call;
/// `compute` only compares.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HysteresisController {
    setpoint_x100: i16,
    low_threshold_x100: i16,
    high_threshold_x100: i16,
    low_limit_x100: i16,
    high_limit_x100: i16,
    output: bool,
    last_deviation_x100: i16,
}

impl Default for HysteresisController {
    fn default() -> Self {
        Self::new()
    }
}

impl HysteresisController {
    pub fn new() -> Self {
        let mut ctl = Self {
            setpoint_x100: DEFAULT_HUMIDITY_X100,
            low_threshold_x100: DEFAULT_LOW_THRESHOLD_X100,
            high_threshold_x100: DEFAULT_HIGH_THRESHOLD_X100,
            low_limit_x100: 0,
            high_limit_x100: 0,
            output: false,
            last_deviation_x100: 0,
        };
        ctl.recalculate_limits();
        ctl
    }

    /// Set the target humidity (×100).
    pub fn set_setpoint(&mut self, setpoint_x100: i16) {
        self.setpoint_x100 = setpoint_x100;
        self.recalculate_limits();
    }

    /// Set how far below the setpoint the output switches on (×100).
    pub fn set_low_threshold(&mut self, threshold_x100: i16) {
        self.low_threshold_x100 = threshold_x100;
        self.recalculate_limits();
    }

    /// Set how far above the setpoint the output switches off (×100).
    pub fn set_high_threshold(&mut self, threshold_x100: i16) {
        self.high_threshold_x100 = threshold_x100;
        self.recalculate_limits();
    }

    /// Run one control step against a measured humidity (×100).
    ///
    /// The latch only moves at the band edges; inside the open interval
    /// `(low_limit, high_limit)` the previous output is kept.
    pub fn compute(&mut self, measured_x100: i16) -> bool {
        self.last_deviation_x100 = self.setpoint_x100.saturating_sub(measured_x100);

        if measured_x100 <= self.low_limit_x100 {
            self.output = true;
        } else if measured_x100 >= self.high_limit_x100 {
            self.output = false;
        }

        self.output
    }

    pub fn output(&self) -> bool {
        self.output
    }

    pub fn setpoint_x100(&self) -> i16 {
        self.setpoint_x100
    }

    pub fn low_threshold_x100(&self) -> i16 {
        self.low_threshold_x100
    }

    pub fn high_threshold_x100(&self) -> i16 {
        self.high_threshold_x100
    }

    /// Setpoint minus the last measured value (×100).
    pub fn deviation_x100(&self) -> i16 {
        self.last_deviation_x100
    }

    fn recalculate_limits(&mut self) {
        self.low_limit_x100 = self.setpoint_x100.saturating_sub(self.low_threshold_x100);
        self.high_limit_x100 = self.setpoint_x100.saturating_add(self.high_threshold_x100);
    }
}
