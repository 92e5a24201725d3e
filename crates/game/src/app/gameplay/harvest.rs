use engine::{EntityId, Layer, LayerMask, SpatialIndex, Vec2};
use serde::Deserialize;
use tracing::warn;

#[cfg(test)]
use super::dwell::DwellPhase;
use super::dwell::{ActionTicker, DwellDetector, DwellTuning, MotionSample};

const HARVEST_TARGET_MASK: LayerMask = LayerMask::NONE.with(Layer::Interactable);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AgentMode {
    Harvest,
    Combat,
}

impl AgentMode {
    pub(crate) fn toggled(self) -> Self {
        match self {
            Self::Harvest => Self::Combat,
            Self::Combat => Self::Harvest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct HarvestTuning {
    pub(crate) ticks_per_second: f32,
    pub(crate) damage_per_tick: u32,
    pub(crate) action_radius: f32,
    pub(crate) candidate_padding: f32,
    pub(crate) epsilon: f32,
}

impl Default for HarvestTuning {
    fn default() -> Self {
        Self {
            ticks_per_second: 3.0,
            damage_per_tick: 1,
            action_radius: 0.60,
            candidate_padding: 0.5,
            epsilon: 0.01,
        }
    }
}

impl HarvestTuning {
    fn is_usable(&self) -> bool {
        self.action_radius.is_finite() && self.action_radius > 0.0
    }

    /// Broad-phase query padded by `candidate_padding`, then an exact
    /// closest-point test against `action_radius`.
    pub(crate) fn targets_in_range(&self, spatial: &SpatialIndex, center: Vec2) -> Vec<EntityId> {
        if !self.is_usable() {
            return Vec::new();
        }
        let limit = self.reach_squared();
        spatial
            .query_circle(center, self.query_radius(), HARVEST_TARGET_MASK)
            .into_iter()
            .filter(|id| within_reach(spatial, *id, center, limit))
            .collect()
    }

    pub(crate) fn has_target_in_range(&self, spatial: &SpatialIndex, center: Vec2) -> bool {
        if !self.is_usable() {
            return false;
        }
        let limit = self.reach_squared();
        spatial
            .query_circle(center, self.query_radius(), HARVEST_TARGET_MASK)
            .into_iter()
            .any(|id| within_reach(spatial, id, center, limit))
    }

    fn query_radius(&self) -> f32 {
        self.action_radius + self.candidate_padding.max(0.0)
    }

    fn reach_squared(&self) -> f32 {
        self.action_radius * self.action_radius + self.epsilon * self.epsilon
    }
}

fn within_reach(spatial: &SpatialIndex, id: EntityId, center: Vec2, limit: f32) -> bool {
    spatial
        .closest_point(id, center)
        .is_some_and(|point| point.distance_squared(center) <= limit)
}

/// Dwell detector plus action ticker, gated by the agent mode and by the day
/// cycle. Each fire returns the interactables that take one harvest hit.
#[derive(Debug, Clone)]
pub(crate) struct Harvester {
    tuning: HarvestTuning,
    detector: DwellDetector,
    ticker: ActionTicker,
    enabled: bool,
    misconfiguration_warned: bool,
}

impl Harvester {
    pub(crate) fn new(dwell: DwellTuning, tuning: HarvestTuning) -> Self {
        Self {
            tuning,
            detector: DwellDetector::new(dwell),
            ticker: ActionTicker::default(),
            enabled: false,
            misconfiguration_warned: false,
        }
    }

    pub(crate) fn tuning(&self) -> &HarvestTuning {
        &self.tuning
    }

    #[cfg(test)]
    pub(crate) fn detector(&self) -> &DwellDetector {
        &self.detector
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> DwellPhase {
        self.detector.phase()
    }

    #[cfg(test)]
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.reset();
    }

    pub(crate) fn reset(&mut self) {
        self.detector.reset();
        self.ticker.reset();
    }

    pub(crate) fn tick(
        &mut self,
        sample: MotionSample,
        mode: AgentMode,
        spatial: &SpatialIndex,
    ) -> Vec<EntityId> {
        if !self.enabled || mode != AgentMode::Harvest {
            self.reset();
            return Vec::new();
        }
        if !self.tuning.is_usable() && !self.misconfiguration_warned {
            self.misconfiguration_warned = true;
            warn!(
                action_radius = self.tuning.action_radius,
                "harvest_radius_not_positive"
            );
        }

        let tuning = self.tuning;
        let center = sample.position;
        let acting = self
            .detector
            .update(sample, || tuning.has_target_in_range(spatial, center));
        if !acting {
            self.ticker.reset();
            return Vec::new();
        }
        if !self.ticker.advance(sample.dt, tuning.ticks_per_second) {
            return Vec::new();
        }
        tuning.targets_in_range(spatial, center)
    }
}
