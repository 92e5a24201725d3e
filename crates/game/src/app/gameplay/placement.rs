use engine::{Layer, LayerMask, Vec2};
use rand::Rng;

/// Axis-aligned spawn rectangle. Corners are normalized on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SpawnArea {
    min: Vec2,
    max: Vec2,
}

impl SpawnArea {
    pub(crate) fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: Vec2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Vec2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub(crate) fn min(&self) -> Vec2 {
        self.min
    }

    pub(crate) fn max(&self) -> Vec2 {
        self.max
    }

    pub(crate) fn is_empty(&self) -> bool {
        !(self.min.is_finite() && self.max.is_finite())
            || self.max.x - self.min.x <= 0.0
            || self.max.y - self.min.y <= 0.0
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub(crate) fn clamp(&self, point: Vec2) -> Vec2 {
        point.clamp(self.min, self.max)
    }

    fn sample(&self, rng: &mut impl Rng) -> Vec2 {
        Vec2::new(
            rng.random_range(self.min.x..=self.max.x),
            rng.random_range(self.min.y..=self.max.y),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlacementParams {
    pub(crate) max_tries: u32,
    pub(crate) min_distance_from_agent: f32,
    pub(crate) footprint_radius: f32,
    pub(crate) blocking: LayerMask,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            max_tries: 24,
            min_distance_from_agent: 2.0,
            footprint_radius: 0.25,
            blocking: LayerMask::of(&[Layer::Obstacle, Layer::Interactable, Layer::Hostile]),
        }
    }
}

/// Read side of the world as seen by the placement search.
pub(crate) trait PlacementQuery {
    fn agent_position(&self) -> Option<Vec2>;
    fn is_blocked(&self, center: Vec2, radius: f32, mask: LayerMask) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Placement {
    pub(crate) position: Option<Vec2>,
    pub(crate) attempts: u32,
}

/// Uniform rejection sampling inside `area`, bounded by `max_tries`.
pub(crate) fn find_placement<Q: PlacementQuery + ?Sized>(
    area: &SpawnArea,
    params: &PlacementParams,
    query: &Q,
    rng: &mut impl Rng,
) -> Placement {
    if area.is_empty() {
        return Placement {
            position: None,
            attempts: 0,
        };
    }

    let agent = query.agent_position();
    let min_distance_sq = params.min_distance_from_agent.max(0.0).powi(2);
    let footprint = params.footprint_radius.max(0.0);

    for attempt in 1..=params.max_tries {
        let candidate = area.sample(rng);
        if agent.is_some_and(|agent| candidate.distance_squared(agent) < min_distance_sq) {
            continue;
        }
        if query.is_blocked(candidate, footprint, params.blocking) {
            continue;
        }
        return Placement {
            position: Some(candidate),
            attempts: attempt,
        };
    }

    Placement {
        position: None,
        attempts: params.max_tries,
    }
}
