use engine::Vec2;
use serde::Deserialize;

const MIN_SAMPLE_DT_SECONDS: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct DwellTuning {
    pub(crate) settle_time: f32,
    pub(crate) start_speed_threshold: f32,
    pub(crate) stop_speed_threshold: f32,
    pub(crate) jitter_radius: f32,
    pub(crate) speed_smoothing: f32,
}

impl Default for DwellTuning {
    fn default() -> Self {
        Self {
            settle_time: 0.35,
            start_speed_threshold: 0.40,
            stop_speed_threshold: 0.80,
            jitter_radius: 0.03,
            speed_smoothing: 0.20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DwellPhase {
    Moving,
    Settling,
    Acting,
}

/// One tick of agent motion. `velocity` wins over position differencing when
/// the mover knows it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MotionSample {
    pub(crate) position: Vec2,
    pub(crate) velocity: Option<Vec2>,
    pub(crate) dt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DwellState {
    pub(crate) phase: DwellPhase,
    pub(crate) anchor: Vec2,
    pub(crate) smoothed_speed: f32,
    pub(crate) settle_elapsed: f32,
    pub(crate) progress: f32,
}

impl Default for DwellState {
    fn default() -> Self {
        Self {
            phase: DwellPhase::Moving,
            anchor: Vec2::ZERO,
            smoothed_speed: 0.0,
            settle_elapsed: 0.0,
            progress: 0.0,
        }
    }
}

/// Hysteresis over smoothed agent speed. Entering `Acting` needs the speed to
/// stay under the start threshold for `settle_time` inside the jitter radius;
/// leaving it needs the higher stop threshold or a larger displacement.
#[derive(Debug, Clone)]
pub(crate) struct DwellDetector {
    tuning: DwellTuning,
    state: DwellState,
    previous_position: Option<Vec2>,
}

impl DwellDetector {
    pub(crate) fn new(tuning: DwellTuning) -> Self {
        Self {
            tuning,
            state: DwellState::default(),
            previous_position: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &DwellState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> DwellPhase {
        self.state.phase
    }

    #[cfg(test)]
    pub(crate) fn progress(&self) -> f32 {
        self.state.progress
    }

    /// Back to `Moving` with no accumulated dwell. Speed smoothing is kept.
    pub(crate) fn reset(&mut self) {
        self.state.phase = DwellPhase::Moving;
        self.state.settle_elapsed = 0.0;
        self.state.progress = 0.0;
    }

    /// Advances one tick. Returns true when the tick was spent in `Acting`,
    /// which is the only time the action ticker may advance.
    pub(crate) fn update(
        &mut self,
        sample: MotionSample,
        mut has_target: impl FnMut() -> bool,
    ) -> bool {
        let dt = if sample.dt.is_finite() {
            sample.dt.max(0.0)
        } else {
            0.0
        };
        let instantaneous = match sample.velocity {
            Some(velocity) => velocity.length(),
            None => self
                .previous_position
                .map(|previous| {
                    sample.position.distance(previous) / dt.max(MIN_SAMPLE_DT_SECONDS)
                })
                .unwrap_or(0.0),
        };
        self.previous_position = Some(sample.position);

        let smoothing = self.tuning.speed_smoothing.clamp(0.0, 1.0);
        let smoothed = lerp(self.state.smoothed_speed, instantaneous, smoothing);
        self.state.smoothed_speed = smoothed;

        let jitter_sq = self.tuning.jitter_radius * self.tuning.jitter_radius;
        let displacement_sq = sample.position.distance_squared(self.state.anchor);

        match self.state.phase {
            DwellPhase::Moving => {
                self.state.settle_elapsed = 0.0;
                self.state.progress = 0.0;
                self.state.anchor = sample.position;
                if smoothed <= self.tuning.start_speed_threshold {
                    self.state.phase = DwellPhase::Settling;
                    self.settle(sample.position, smoothed, dt, &mut has_target);
                }
                false
            }
            DwellPhase::Settling => {
                if displacement_sq > jitter_sq {
                    self.state.anchor = sample.position;
                    self.state.settle_elapsed = 0.0;
                    self.state.progress = 0.0;
                }
                self.settle(sample.position, smoothed, dt, &mut has_target);
                false
            }
            DwellPhase::Acting => {
                if smoothed >= self.tuning.stop_speed_threshold
                    || displacement_sq > 4.0 * jitter_sq
                {
                    self.reset();
                    return false;
                }
                if !has_target() {
                    self.state.phase = DwellPhase::Settling;
                    self.state.settle_elapsed = 0.0;
                    self.state.progress = 0.0;
                    return false;
                }
                true
            }
        }
    }

    fn settle(
        &mut self,
        position: Vec2,
        smoothed: f32,
        dt: f32,
        has_target: &mut impl FnMut() -> bool,
    ) {
        if smoothed > self.tuning.start_speed_threshold {
            self.state.phase = DwellPhase::Moving;
            self.state.settle_elapsed = 0.0;
            self.state.progress = 0.0;
            self.state.anchor = position;
            return;
        }

        self.state.settle_elapsed += dt;
        let settle_time = self.tuning.settle_time;
        self.state.progress = if settle_time > 0.0 {
            (self.state.settle_elapsed / settle_time).clamp(0.0, 1.0)
        } else {
            1.0
        };

        if self.state.settle_elapsed >= settle_time {
            if has_target() {
                self.state.phase = DwellPhase::Acting;
                self.state.progress = 1.0;
            } else {
                self.state.settle_elapsed = 0.0;
                self.state.progress = 0.0;
            }
        }
    }
}

/// Fixed-rate pulse while the detector reports `Acting`.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionTicker {
    elapsed: f32,
}

impl ActionTicker {
    pub(crate) fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    pub(crate) fn advance(&mut self, dt: f32, ticks_per_second: f32) -> bool {
        let interval = 1.0 / ticks_per_second.max(1.0);
        self.elapsed += dt.max(0.0);
        if self.elapsed >= interval {
            self.elapsed = 0.0;
            return true;
        }
        false
    }
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.0167;

    fn still(velocity: f32) -> MotionSample {
        MotionSample {
            position: Vec2::new(1.0, 1.0),
            velocity: Some(Vec2::new(velocity, 0.0)),
            dt: DT,
        }
    }

    fn settle_into_acting(detector: &mut DwellDetector) {
        for _ in 0..40 {
            detector.update(still(0.1), || true);
            if detector.phase() == DwellPhase::Acting {
                return;
            }
        }
        panic!("detector never reached Acting");
    }

    #[test]
    fn slow_agent_with_target_reaches_acting_by_tick_21() {
        let mut detector = DwellDetector::new(DwellTuning::default());
        let mut previous_progress = 0.0;
        let mut acting_at = None;

        for tick in 1..=25 {
            detector.update(still(0.1), || true);
            if acting_at.is_none() {
                assert!(detector.progress() >= previous_progress);
                previous_progress = detector.progress();
            }
            if detector.phase() == DwellPhase::Acting && acting_at.is_none() {
                acting_at = Some(tick);
                assert_eq!(detector.progress(), 1.0);
            }
        }

        let acting_at = acting_at.expect("reached Acting");
        assert!(acting_at <= 21, "acting at tick {acting_at}");
    }

    #[test]
    fn moving_falls_through_to_settling_in_the_same_tick() {
        let mut detector = DwellDetector::new(DwellTuning::default());
        detector.update(still(0.0), || true);
        assert_eq!(detector.phase(), DwellPhase::Settling);
        assert!(detector.state().settle_elapsed > 0.0);
    }

    #[test]
    fn crossing_stop_threshold_in_acting_goes_to_moving() {
        let mut detector = DwellDetector::new(DwellTuning::default());
        settle_into_acting(&mut detector);

        detector.update(still(6.0), || true);
        assert_eq!(detector.phase(), DwellPhase::Moving);
        assert_eq!(detector.progress(), 0.0);
    }

    #[test]
    fn speed_between_thresholds_keeps_acting() {
        let mut detector = DwellDetector::new(DwellTuning::default());
        settle_into_acting(&mut detector);

        // Smoothed speed ends above the start threshold but under stop.
        for _ in 0..6 {
            assert!(detector.update(still(0.6), || true));
        }
        assert_eq!(detector.phase(), DwellPhase::Acting);
    }

    #[test]
    fn losing_target_while_acting_returns_to_settling() {
        let mut detector = DwellDetector::new(DwellTuning::default());
        settle_into_acting(&mut detector);

        assert!(!detector.update(still(0.0), || false));
        assert_eq!(detector.phase(), DwellPhase::Settling);
        assert_eq!(detector.progress(), 0.0);
    }

    #[test]
    fn no_target_keeps_settling_and_restarts_progress() {
        let mut detector = DwellDetector::new(DwellTuning::default());
        for _ in 0..60 {
            detector.update(still(0.0), || false);
            assert_ne!(detector.phase(), DwellPhase::Acting);
        }
        assert_eq!(detector.phase(), DwellPhase::Settling);
    }

    #[test]
    fn drift_outside_jitter_radius_restarts_settle() {
        let mut detector = DwellDetector::new(DwellTuning::default());
        for _ in 0..10 {
            detector.update(still(0.0), || true);
        }
        assert!(detector.progress() > 0.0);

        detector.update(
            MotionSample {
                position: Vec2::new(1.2, 1.0),
                velocity: Some(Vec2::ZERO),
                dt: DT,
            },
            || true,
        );
        assert_eq!(detector.phase(), DwellPhase::Settling);
        assert!(detector.progress() < 0.1);
    }

    #[test]
    fn speed_is_derived_from_positions_without_velocity() {
        let mut detector = DwellDetector::new(DwellTuning::default());
        for step in 0..30 {
            detector.update(
                MotionSample {
                    position: Vec2::new(step as f32 * 0.1, 0.0),
                    velocity: None,
                    dt: DT,
                },
                || true,
            );
        }
        assert_eq!(detector.phase(), DwellPhase::Moving);
        assert!(detector.state().smoothed_speed > 1.0);
    }

    #[test]
    fn ticker_fires_at_configured_rate() {
        let mut ticker = ActionTicker::default();
        let fired = (0..60).filter(|_| ticker.advance(0.02, 3.0)).count();
        assert_eq!(fired, 3);
    }

    #[test]
    fn ticker_rate_is_clamped_to_at_least_one_per_second() {
        let mut ticker = ActionTicker::default();
        assert!(!ticker.advance(0.5, 0.0));
        assert!(ticker.advance(0.5, 0.0));
    }
}
