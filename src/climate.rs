//! Climate controller composition
//!
//! Owns the five control pieces and runs them in a fixed order once per
//! tick: lifecycle, heater PID, humidity hysteresis, egg turner. The
//! lifecycle decides the setpoints, the loops decide the actuators, and the
//! turner keeps its own clock. Everything the application loop needs comes
//! back in one status snapshot.
//!
//! The controller also carries the validated configuration surface. The
//! pure components accept anything; range policy lives here, and the same
//! setters gate values restored from a persisted [`ClimateConfig`] at boot.

use crate::config::limits;
use crate::config::types::{
    ClimateConfig, HysteresisSettings, IncubationSettings, PidSettings, TurnerSettings,
    CONFIG_MAGIC, CONFIG_VERSION,
};
use crate::control::{ControlMode, Fixed32, HysteresisController, PidController};
use crate::incubation::{IncubationProfile, IncubationRun, Species, Stage};
use crate::safety::{SensorStatus, SensorWatch};
use crate::turner::EggTurner;

/// One tick's worth of outputs, for the relay, display, storage and alarm
/// collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClimateStatus {
    /// Heater relay command.
    pub heater_on: bool,
    /// Humidifier relay command.
    pub humidifier_on: bool,
    /// Turning-motor relay command.
    pub motor_on: bool,
    /// Heater loop mode.
    pub mode: ControlMode,
    /// Lifecycle stage the targets came from.
    pub stage: Stage,
    /// Last good temperature reading (×100), if any arrived yet.
    pub temperature_x100: Option<i16>,
    /// Last good humidity reading (×100), if any arrived yet.
    pub humidity_x100: Option<i16>,
    /// Temperature target in force (×100).
    pub target_temperature_x100: i16,
    /// Humidity target in force (×100).
    pub target_humidity_x100: i16,
    /// Auto-tune progress estimate, 0–100.
    pub tune_progress: u8,
    /// Auto-tune has produced gains.
    pub tune_finished: bool,
    /// An incubation run is active.
    pub incubation_running: bool,
    /// The run has outlived its expected total days.
    pub incubation_completed: bool,
    /// Real day of the run, unbounded.
    pub current_day: u32,
    /// Day clamped to the expected total, for display.
    pub display_day: u32,
    /// Minutes until the next turn.
    pub turn_wait_left_min: u16,
    /// Seconds of turning left (or ahead, while waiting).
    pub turn_run_left_s: u16,
    /// Sensor condition.
    pub sensors: SensorStatus,
}

/// The incubator climate control core.
///
/// Poll-driven: the application calls [`tick`] with fresh sensor samples at
/// a sub-second rate and forwards the returned commands to the relays. All
/// setters are safe to call between ticks; a change is picked up whole on
/// the next tick.
///
/// [`tick`]: Self::tick
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClimateController {
    pid: PidController,
    hysteresis: HysteresisController,
    run: IncubationRun,
    turner: EggTurner,
    sensors: SensorWatch,

    turn_wait_minutes: u16,
    turn_run_seconds: u16,
    /// Species and stage whose targets were last pushed into the loops.
    /// `None` forces a push on the next tick.
    pushed_targets: Option<(Species, Stage)>,
}

impl Default for ClimateController {
    fn default() -> Self {
        Self::new()
    }
}

impl ClimateController {
    pub fn new() -> Self {
        Self {
            pid: PidController::new(),
            hysteresis: HysteresisController::new(),
            run: IncubationRun::new(),
            turner: EggTurner::new(),
            sensors: SensorWatch::new(),
            turn_wait_minutes: crate::turner::DEFAULT_WAIT_MINUTES,
            turn_run_seconds: crate::turner::DEFAULT_RUN_SECONDS,
            pushed_targets: None,
        }
    }

    /// One control tick. `None` stands for a missed sensor read.
    ///
    /// Order is fixed: the lifecycle first (it may move the setpoints),
    /// then the heater loop, the humidity loop, and the turner. An actuator
    /// whose sensor missed this tick is commanded off; its loop state is
    /// left alone so a single dropout does not unwind the control history.
    pub fn tick(
        &mut self,
        temperature_x100: Option<i16>,
        humidity_x100: Option<i16>,
        now_ms: u64,
    ) -> ClimateStatus {
        self.run.update(now_ms);
        self.sync_targets();

        self.sensors.update_temperature(temperature_x100);
        self.sensors.update_humidity(humidity_x100);

        // A dead temperature sensor makes relay-feedback meaningless and
        // leaves the heater wherever the tuner last put it. Abort.
        if self.pid.mode() == ControlMode::AutoTune && self.sensors.temperature_failed() {
            self.pid.cancel_tune(now_ms);
        }

        let heater_on = match temperature_x100 {
            Some(temp) => {
                self.pid.compute(temp, now_ms);
                self.pid.is_output_active()
            }
            None => false,
        };

        let humidifier_on = match humidity_x100 {
            Some(humidity) => self.hysteresis.compute(humidity),
            None => false,
        };

        let motor_on = self
            .turner
            .update(now_ms, self.turn_wait_minutes, self.turn_run_seconds);

        ClimateStatus {
            heater_on,
            humidifier_on,
            motor_on,
            mode: self.pid.mode(),
            stage: self.run.stage(),
            temperature_x100: self.sensors.temperature_x100(),
            humidity_x100: self.sensors.humidity_x100(),
            target_temperature_x100: self.pid.setpoint_x100(),
            target_humidity_x100: self.hysteresis.setpoint_x100(),
            tune_progress: self.pid.tuner().progress(),
            tune_finished: self.pid.tuner().is_finished(),
            incubation_running: self.run.is_running(),
            incubation_completed: self.run.is_completed(),
            current_day: self.run.current_day(now_ms),
            display_day: self.run.display_day(now_ms),
            turn_wait_left_min: self.turner.wait_time_left_min(now_ms),
            turn_run_left_s: self.turner.run_time_left_s(now_ms),
            sensors: self.sensors.check(),
        }
    }

    /// Copy the lifecycle's stage targets into the loops whenever the
    /// species/stage pair producing them has changed.
    fn sync_targets(&mut self) {
        if !self.run.is_running() {
            return;
        }
        let key = (self.run.species(), self.run.stage());
        if self.pushed_targets == Some(key) {
            return;
        }
        self.pushed_targets = Some(key);
        let _ = self.pid.set_setpoint(self.run.target_temperature_x100());
        self.hysteresis.set_setpoint(self.run.target_humidity_x100());
    }

    // --- heater loop ---

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    /// Switch the heater loop's mode.
    pub fn set_mode(&mut self, mode: ControlMode, now_ms: u64) {
        self.pid.set_mode(mode, now_ms);
    }

    /// Arm or disarm the manual heater loop.
    pub fn set_heater_active(&mut self, active: bool) -> bool {
        self.pid.set_active(active)
    }

    /// Abort an in-progress auto-tune.
    pub fn cancel_tune(&mut self, now_ms: u64) {
        self.pid.cancel_tune(now_ms);
    }

    /// Replace the PID gains; negatives reject the whole set.
    pub fn set_gains(&mut self, kp: Fixed32, ki: Fixed32, kd: Fixed32) -> bool {
        self.pid.set_gains(kp, ki, kd)
    }

    /// Mode as the display prints it.
    pub fn mode_label(&self) -> &'static str {
        self.pid.mode_label()
    }

    // --- humidity loop ---

    pub fn hysteresis(&self) -> &HysteresisController {
        &self.hysteresis
    }

    /// Humidity setpoint (×100). The hysteresis component takes anything;
    /// the operator range is enforced here.
    pub fn set_humidity_setpoint(&mut self, setpoint_x100: i16) -> bool {
        if !limits::valid_humidity_setpoint(setpoint_x100) {
            return false;
        }
        self.hysteresis.set_setpoint(setpoint_x100);
        true
    }

    /// Band extent below the humidity setpoint (×100).
    pub fn set_humidity_low_threshold(&mut self, threshold_x100: i16) -> bool {
        if !limits::valid_hysteresis_threshold(threshold_x100) {
            return false;
        }
        self.hysteresis.set_low_threshold(threshold_x100);
        true
    }

    /// Band extent above the humidity setpoint (×100).
    pub fn set_humidity_high_threshold(&mut self, threshold_x100: i16) -> bool {
        if !limits::valid_hysteresis_threshold(threshold_x100) {
            return false;
        }
        self.hysteresis.set_high_threshold(threshold_x100);
        true
    }

    // --- incubation lifecycle ---

    pub fn incubation(&self) -> &IncubationRun {
        &self.run
    }

    /// Select a species. Allowed mid-run; new targets land on the next
    /// tick.
    pub fn set_species(&mut self, species: Species) {
        self.run.set_species(species);
        self.pushed_targets = None;
    }

    /// Replace the manual profile. Rejected unless both stages get at
    /// least a day.
    pub fn set_manual_profile(&mut self, profile: IncubationProfile) -> bool {
        if !self.run.set_manual_profile(profile) {
            return false;
        }
        if self.run.species() == Species::Manual {
            self.pushed_targets = None;
        }
        true
    }

    /// Temperature target override for the current stage. Applies to the
    /// heater loop directly and, when the manual species is selected, to
    /// the stored manual profile too.
    pub fn set_target_temperature(&mut self, value_x100: i16) -> bool {
        if !self.pid.set_setpoint(value_x100) {
            return false;
        }
        let _ = self.run.set_target_temperature_x100(value_x100);
        true
    }

    /// Humidity target override for the current stage, same shape as
    /// [`set_target_temperature`].
    ///
    /// [`set_target_temperature`]: Self::set_target_temperature
    pub fn set_target_humidity(&mut self, value_x100: i16) -> bool {
        if !self.set_humidity_setpoint(value_x100) {
            return false;
        }
        let _ = self.run.set_target_humidity_x100(value_x100);
        true
    }

    /// Begin an incubation run now. The stage targets replace the current
    /// setpoints on the next tick.
    pub fn start_incubation(&mut self, now_ms: u64) {
        self.run.start(now_ms);
        self.pushed_targets = None;
    }

    /// End the run. Setpoints keep their last values; the operator decides
    /// what happens next.
    pub fn stop_incubation(&mut self) {
        self.run.stop();
        self.pushed_targets = None;
    }

    // --- egg turner ---

    pub fn turner(&self) -> &EggTurner {
        &self.turner
    }

    pub fn turn_wait_minutes(&self) -> u16 {
        self.turn_wait_minutes
    }

    pub fn turn_run_seconds(&self) -> u16 {
        self.turn_run_seconds
    }

    /// Minutes between turns. The running phase rescales on the next tick.
    pub fn set_turn_wait_minutes(&mut self, minutes: u16) -> bool {
        if !limits::valid_turn_wait(minutes) {
            return false;
        }
        self.turn_wait_minutes = minutes;
        true
    }

    /// Seconds per turn. The running phase rescales on the next tick.
    pub fn set_turn_run_seconds(&mut self, seconds: u16) -> bool {
        if !limits::valid_turn_run(seconds) {
            return false;
        }
        self.turn_run_seconds = seconds;
        true
    }

    // --- persistence ---

    /// Restore a persisted configuration through the validated setters.
    ///
    /// Call once at boot, before the first tick. Out-of-range stored
    /// values lose to the factory defaults field by field; a saved run is
    /// resumed on its original clock.
    pub fn apply_config(&mut self, config: &ClimateConfig, now_ms: u64) {
        let _ = self.set_gains(
            Fixed32::from_scaled_1000(config.pid.kp_x1000),
            Fixed32::from_scaled_1000(config.pid.ki_x1000),
            Fixed32::from_scaled_1000(config.pid.kd_x1000),
        );
        let _ = self.pid.set_setpoint(config.pid.setpoint_x100);

        let _ = self.set_humidity_setpoint(config.hysteresis.setpoint_x100);
        let _ = self.set_humidity_low_threshold(config.hysteresis.low_threshold_x100);
        let _ = self.set_humidity_high_threshold(config.hysteresis.high_threshold_x100);

        let _ = self.set_turn_wait_minutes(config.turner.wait_minutes);
        let _ = self.set_turn_run_seconds(config.turner.run_seconds);

        self.run.set_species(config.incubation.species);
        let _ = self.run.set_manual_profile(config.incubation.manual_profile);
        if config.incubation.running {
            self.run.resume(config.incubation.started_at_ms, now_ms);
        }
        // a resumed run re-pushes its stage targets on the first tick; a
        // stopped one keeps the restored setpoints
        self.pushed_targets = None;
    }

    /// Current configuration, ready for the storage collaborator.
    pub fn snapshot(&self) -> ClimateConfig {
        let gains = self.pid.gains();
        ClimateConfig {
            magic: CONFIG_MAGIC,
            version: CONFIG_VERSION,
            pid: PidSettings {
                kp_x1000: gains.kp.to_scaled_1000(),
                ki_x1000: gains.ki.to_scaled_1000(),
                kd_x1000: gains.kd.to_scaled_1000(),
                setpoint_x100: self.pid.setpoint_x100(),
            },
            hysteresis: HysteresisSettings {
                setpoint_x100: self.hysteresis.setpoint_x100(),
                low_threshold_x100: self.hysteresis.low_threshold_x100(),
                high_threshold_x100: self.hysteresis.high_threshold_x100(),
            },
            turner: TurnerSettings {
                wait_minutes: self.turn_wait_minutes,
                run_seconds: self.turn_run_seconds,
            },
            incubation: IncubationSettings {
                species: self.run.species(),
                manual_profile: self.run.manual_profile(),
                running: self.run.is_running(),
                started_at_ms: self.run.started_at_ms(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::SensorFault;

    const DAY_MS: u64 = 86_400_000;

    /// Controller past its boot stabilization window, loop armed.
    fn armed() -> ClimateController {
        let mut climate = ClimateController::new();
        climate.set_heater_active(true);
        climate
    }

    #[test]
    fn starting_a_run_pushes_stage_targets() {
        let mut climate = armed();
        assert_eq!(climate.pid().setpoint_x100(), 3_750);

        climate.start_incubation(0);
        let status = climate.tick(Some(3_700), Some(5_800), 2_000);

        assert_eq!(status.stage, Stage::Development);
        assert_eq!(status.target_temperature_x100, 3_780, "chicken development");
        assert_eq!(status.target_humidity_x100, 6_000);
        assert_eq!(status.current_day, 1);
        assert!(status.incubation_running);
    }

    #[test]
    fn stage_change_moves_both_setpoints() {
        let mut climate = armed();
        climate.start_incubation(0);
        climate.tick(Some(3_780), Some(6_000), 2_000);

        let status = climate.tick(Some(3_780), Some(6_000), 18 * DAY_MS);
        assert_eq!(status.stage, Stage::Hatching, "day 19");
        assert_eq!(status.target_temperature_x100, 3_750);
        assert_eq!(status.target_humidity_x100, 7_000);
    }

    #[test]
    fn completion_reports_but_never_stops() {
        let mut climate = armed();
        climate.start_incubation(0);

        let status = climate.tick(Some(3_750), Some(7_000), 21 * DAY_MS);
        assert!(status.incubation_completed, "day 22 of 21");
        assert!(status.incubation_running);
        assert_eq!(status.stage, Stage::Hatching);
        assert_eq!(status.current_day, 22);
        assert_eq!(status.display_day, 21);

        climate.stop_incubation();
        let status = climate.tick(Some(3_750), Some(7_000), 21 * DAY_MS + 1_000);
        assert!(!status.incubation_running);
        assert!(!status.incubation_completed);
    }

    #[test]
    fn missed_temperature_holds_the_heater_off() {
        let mut climate = armed();
        let status = climate.tick(Some(3_600), Some(6_000), 2_000);
        assert!(status.heater_on, "1.5 degrees low heats");

        let status = climate.tick(None, Some(6_000), 2_500);
        assert!(!status.heater_on, "no sample, no heat");
        assert_eq!(status.temperature_x100, Some(3_600), "last reading kept");
        assert_eq!(status.sensors, SensorStatus::Ok, "one miss is not a fault");

        let status = climate.tick(Some(3_600), Some(6_000), 3_000);
        assert!(status.heater_on, "recovers with the next sample");
    }

    #[test]
    fn missed_humidity_skips_the_humidifier_without_unlatching() {
        let mut climate = ClimateController::new();
        let status = climate.tick(Some(3_750), Some(5_400), 2_000);
        assert!(status.humidifier_on, "below the band latches on");

        let status = climate.tick(Some(3_750), None, 2_500);
        assert!(!status.humidifier_on);

        // inside the band: the latch must still hold from before the miss
        let status = climate.tick(Some(3_750), Some(5_800), 3_000);
        assert!(status.humidifier_on, "latch survived the dropout");
    }

    #[test]
    fn dead_temperature_sensor_aborts_a_tune() {
        let mut climate = ClimateController::new();
        climate.set_mode(ControlMode::AutoTune, 0);

        let mut now = 2_000;
        for _ in 0..4 {
            let status = climate.tick(None, Some(6_000), now);
            assert_eq!(status.mode, ControlMode::AutoTune);
            now += 500;
        }
        let status = climate.tick(None, Some(6_000), now);
        assert_eq!(status.mode, ControlMode::Manual, "fifth miss cancels");
        assert!(!status.heater_on);
        assert_eq!(status.sensors, SensorStatus::Fault(SensorFault::Temperature));
    }

    #[test]
    fn range_policy_lives_on_the_composition() {
        let mut climate = ClimateController::new();

        assert!(climate.set_humidity_setpoint(5_500));
        assert!(!climate.set_humidity_setpoint(2_999));
        assert!(!climate.set_humidity_setpoint(9_001));
        assert_eq!(climate.hysteresis().setpoint_x100(), 5_500);

        assert!(climate.set_humidity_low_threshold(1_000));
        assert!(!climate.set_humidity_low_threshold(-1));
        assert!(!climate.set_humidity_high_threshold(2_001));

        assert!(climate.set_turn_wait_minutes(60));
        assert!(!climate.set_turn_wait_minutes(0));
        assert!(!climate.set_turn_wait_minutes(241));
        assert!(climate.set_turn_run_seconds(30));
        assert!(!climate.set_turn_run_seconds(61));
        assert_eq!(climate.turn_wait_minutes(), 60);
        assert_eq!(climate.turn_run_seconds(), 30);
    }

    #[test]
    fn turner_follows_the_configured_intervals() {
        let mut climate = ClimateController::new();
        climate.set_turn_wait_minutes(1);
        climate.set_turn_run_seconds(10);

        let status = climate.tick(Some(3_750), Some(6_000), 0);
        assert!(!status.motor_on, "first tick anchors a full wait");
        assert_eq!(status.turn_wait_left_min, 1);

        let status = climate.tick(Some(3_750), Some(6_000), 60_000);
        assert!(status.motor_on);
        assert_eq!(status.turn_run_left_s, 10);

        let status = climate.tick(Some(3_750), Some(6_000), 70_000);
        assert!(!status.motor_on, "turn over, resting again");
    }

    #[test]
    fn target_overrides_follow_the_manual_stage() {
        let mut climate = ClimateController::new();
        climate.set_species(Species::Manual);
        climate.start_incubation(0);
        climate.tick(Some(3_750), Some(6_000), 2_000);

        assert!(climate.set_target_temperature(3_810));
        assert!(climate.set_target_humidity(5_800));
        assert_eq!(climate.pid().setpoint_x100(), 3_810);
        assert_eq!(climate.hysteresis().setpoint_x100(), 5_800);
        let profile = climate.incubation().manual_profile();
        assert_eq!(profile.development_temp_x100, 3_810);
        assert_eq!(profile.development_humidity_x100, 5_800);

        assert!(!climate.set_target_temperature(5_100), "absolute range holds");
        assert!(!climate.set_target_humidity(9_500));
    }

    #[test]
    fn preset_species_still_take_live_overrides() {
        let mut climate = ClimateController::new();
        climate.start_incubation(0);
        climate.tick(Some(3_780), Some(6_000), 2_000);

        // the loop setpoint moves; the chicken preset does not
        assert!(climate.set_target_temperature(3_800));
        assert_eq!(climate.pid().setpoint_x100(), 3_800);

        // and the next stage change reasserts the preset
        let status = climate.tick(Some(3_780), Some(6_000), 18 * DAY_MS);
        assert_eq!(status.target_temperature_x100, 3_750);
    }

    #[test]
    fn snapshot_round_trips_through_apply() {
        let mut climate = ClimateController::new();
        assert!(climate.set_gains(
            Fixed32::from_scaled_1000(764),
            Fixed32::from_scaled_1000(13),
            Fixed32::from_int(11),
        ));
        climate.set_target_temperature(3_780);
        climate.set_humidity_setpoint(5_500);
        climate.set_humidity_low_threshold(300);
        climate.set_turn_wait_minutes(90);
        climate.set_species(Species::Goose);
        climate.start_incubation(5 * DAY_MS);

        let saved = climate.snapshot();
        assert!(saved.is_valid());

        let mut restored = ClimateController::new();
        restored.apply_config(&saved, 9 * DAY_MS);
        assert_eq!(restored.snapshot(), saved);

        let status = restored.tick(Some(3_740), Some(5_500), 9 * DAY_MS + 1_000);
        assert!(status.incubation_running, "saved run resumes");
        assert_eq!(status.current_day, 5, "on the original clock");
        assert_eq!(status.target_temperature_x100, 3_740, "goose development");
    }

    #[test]
    fn corrupt_config_fields_degrade_to_defaults() {
        let mut config = ClimateConfig::new();
        config.pid.kp_x1000 = -5_000;
        config.pid.setpoint_x100 = 9_900;
        config.hysteresis.setpoint_x100 = 12_000;
        config.turner.wait_minutes = 0;

        let mut climate = ClimateController::new();
        climate.apply_config(&config, 0);

        assert_eq!(climate.pid().gains().kp.to_scaled_1000(), 10_000);
        assert_eq!(climate.pid().setpoint_x100(), 3_750);
        assert_eq!(climate.hysteresis().setpoint_x100(), 6_000);
        assert_eq!(climate.turn_wait_minutes(), 120);
    }

    #[test]
    fn species_change_mid_run_repushes_targets() {
        let mut climate = ClimateController::new();
        climate.start_incubation(0);
        climate.tick(Some(3_780), Some(6_000), 2_000);
        assert_eq!(climate.pid().setpoint_x100(), 3_780);

        climate.set_species(Species::Goose);
        let status = climate.tick(Some(3_780), Some(6_000), 3_000);
        assert_eq!(status.target_temperature_x100, 3_740);
        assert_eq!(status.target_humidity_x100, 5_500);
    }

    #[test]
    fn stopped_controller_keeps_operator_setpoints() {
        let mut climate = ClimateController::new();
        climate.set_target_temperature(3_600);
        let status = climate.tick(Some(3_500), Some(6_000), 2_000);
        assert_eq!(status.target_temperature_x100, 3_600, "no run, no push");
        assert_eq!(status.stage, Stage::Development);
        assert_eq!(status.current_day, 0);
    }

    #[test]
    fn full_tune_cycle_through_the_composition() {
        let mut climate = ClimateController::new();
        climate.set_mode(ControlMode::AutoTune, 0);
        let status = climate.tick(Some(3_700), Some(6_000), 2_500);
        assert!(status.heater_on, "relay drives the plant up");
        assert_eq!(status.mode, ControlMode::AutoTune);
        assert!(status.tune_progress < 100);

        let script: &[(i16, u64)] = &[
            (3_760, 4_000),
            (3_805, 5_000),
            (3_835, 6_000),
            (3_850, 7_000),
            (3_843, 8_000),
            (3_810, 9_000),
            (3_760, 10_000),
            (3_705, 11_000),
            (3_695, 12_000),
            (3_688, 13_000),
            (3_700, 14_000),
            (3_740, 15_000),
            (3_790, 16_000),
            (3_820, 17_000),
            (3_845, 18_000),
            (3_838, 19_000),
        ];
        let mut last = None;
        for &(temp, now) in script {
            last = Some(climate.tick(Some(temp), Some(6_000), now));
        }
        let status = last.unwrap();
        assert_eq!(status.mode, ControlMode::Manual, "tuned and back");
        assert!(status.tune_finished);
        assert_eq!(status.tune_progress, 100);
        assert_eq!(climate.mode_label(), "manual (active)");

        // the adopted gains survive a snapshot
        let saved = climate.snapshot();
        assert!((762..=766).contains(&saved.pid.kp_x1000));
    }
}
