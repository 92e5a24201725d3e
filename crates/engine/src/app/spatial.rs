use std::collections::HashMap;

use super::scene::{Entity, EntityId, Vec2};

pub const DEFAULT_CELL_SIZE: f32 = 2.0;
// Entities whose bounds cover more cells than this are kept out of the grid
// and tested linearly by every query.
const MAX_CELLS_PER_ENTRY: i64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Agent,
    Interactable,
    Hostile,
    Obstacle,
}

impl Layer {
    const fn bit(self) -> u32 {
        match self {
            Self::Agent => 1 << 0,
            Self::Interactable => 1 << 1,
            Self::Hostile => 1 << 2,
            Self::Obstacle => 1 << 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LayerMask(u32);

impl LayerMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u32::MAX);

    pub fn of(layers: &[Layer]) -> Self {
        layers
            .iter()
            .fold(Self::NONE, |mask, layer| mask.with(*layer))
    }

    pub const fn with(self, layer: Layer) -> Self {
        Self(self.0 | layer.bit())
    }

    pub const fn contains(self, layer: Layer) -> bool {
        self.0 & layer.bit() != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collider {
    Circle { radius: f32 },
    Box { half_extents: Vec2 },
}

impl Collider {
    pub const fn circle(radius: f32) -> Self {
        Self::Circle { radius }
    }

    pub const fn rect(half_width: f32, half_height: f32) -> Self {
        Self::Box {
            half_extents: Vec2 {
                x: half_width,
                y: half_height,
            },
        }
    }

    pub fn half_extents(self) -> Vec2 {
        match self {
            Self::Circle { radius } => {
                let r = radius.max(0.0);
                Vec2::new(r, r)
            }
            Self::Box { half_extents } => Vec2::new(half_extents.x.max(0.0), half_extents.y.max(0.0)),
        }
    }

    /// Closest point on (or inside) the shape placed at `position` to `point`.
    /// Points inside the shape are their own closest point.
    pub fn closest_point(self, position: Vec2, point: Vec2) -> Vec2 {
        match self {
            Self::Circle { radius } => {
                let offset = point - position;
                let r = radius.max(0.0);
                if offset.length_squared() <= r * r {
                    point
                } else {
                    position + offset.normalized_or_zero() * r
                }
            }
            Self::Box { .. } => {
                let half = self.half_extents();
                point.clamp(position - half, position + half)
            }
        }
    }

    pub fn overlaps_circle(self, position: Vec2, center: Vec2, radius: f32) -> bool {
        if radius < 0.0 {
            return false;
        }
        self.closest_point(position, center).distance_squared(center) <= radius * radius
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedCollider {
    pub id: EntityId,
    pub position: Vec2,
    pub collider: Collider,
    pub layer: Layer,
}

/// Uniform-grid broadphase over committed entities.
///
/// Rebuilt wholesale between ticks; every query is read-only and results are
/// ordered by entity id.
#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: f32,
    entries: Vec<IndexedCollider>,
    slot_by_id: HashMap<EntityId, usize>,
    cells: HashMap<(i32, i32), Vec<usize>>,
    oversized: Vec<usize>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialIndex {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            DEFAULT_CELL_SIZE
        };
        Self {
            cell_size,
            entries: Vec::new(),
            slot_by_id: HashMap::new(),
            cells: HashMap::new(),
            oversized: Vec::new(),
        }
    }

    pub fn rebuild(&mut self, entities: &[Entity]) {
        self.entries.clear();
        self.slot_by_id.clear();
        self.cells.clear();
        self.oversized.clear();

        for entity in entities {
            self.insert(IndexedCollider {
                id: entity.id,
                position: entity.transform.position,
                collider: entity.collider,
                layer: entity.layer,
            });
        }
    }

    pub fn insert(&mut self, entry: IndexedCollider) {
        let slot = self.entries.len();
        let half = entry.collider.half_extents();
        let (min_x, min_y) = self.cell_key(entry.position - half);
        let (max_x, max_y) = self.cell_key(entry.position + half);
        let span = (i64::from(max_x) - i64::from(min_x) + 1) * (i64::from(max_y) - i64::from(min_y) + 1);

        if span > MAX_CELLS_PER_ENTRY {
            self.oversized.push(slot);
        } else {
            for ix in min_x..=max_x {
                for iy in min_y..=max_y {
                    self.cells.entry((ix, iy)).or_default().push(slot);
                }
            }
        }
        self.slot_by_id.insert(entry.id, slot);
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, id: EntityId) -> Option<&IndexedCollider> {
        self.slot_by_id
            .get(&id)
            .and_then(|slot| self.entries.get(*slot))
    }

    /// Closest point on the indexed shape of `id` to `point`.
    pub fn closest_point(&self, id: EntityId, point: Vec2) -> Option<Vec2> {
        self.entry(id)
            .map(|entry| entry.collider.closest_point(entry.position, point))
    }

    /// Entities on `mask` whose shape has a point within `radius` of `center`.
    /// A non-positive or non-finite radius yields no candidates.
    pub fn query_circle(&self, center: Vec2, radius: f32, mask: LayerMask) -> Vec<EntityId> {
        if !radius.is_finite() || radius <= 0.0 || !center.is_finite() {
            return Vec::new();
        }
        let mut ids = self
            .candidate_slots(center, radius)
            .into_iter()
            .filter_map(|slot| self.entries.get(slot))
            .filter(|entry| mask.contains(entry.layer))
            .filter(|entry| entry.collider.overlaps_circle(entry.position, center, radius))
            .map(|entry| entry.id)
            .collect::<Vec<_>>();
        ids.sort();
        ids
    }

    /// Overlap test; a zero radius degenerates to a point-containment test.
    pub fn any_overlap_circle(&self, center: Vec2, radius: f32, mask: LayerMask) -> bool {
        if !radius.is_finite() || radius < 0.0 || !center.is_finite() {
            return false;
        }
        self.candidate_slots(center, radius)
            .into_iter()
            .filter_map(|slot| self.entries.get(slot))
            .any(|entry| {
                mask.contains(entry.layer)
                    && entry.collider.overlaps_circle(entry.position, center, radius)
            })
    }

    fn candidate_slots(&self, center: Vec2, radius: f32) -> Vec<usize> {
        let reach = Vec2::new(radius, radius);
        let (min_x, min_y) = self.cell_key(center - reach);
        let (max_x, max_y) = self.cell_key(center + reach);

        let mut slots = self.oversized.clone();
        for ix in min_x..=max_x {
            for iy in min_y..=max_y {
                if let Some(cell) = self.cells.get(&(ix, iy)) {
                    slots.extend_from_slice(cell);
                }
            }
        }
        slots.sort_unstable();
        slots.dedup();
        slots
    }

    fn cell_key(&self, point: Vec2) -> (i32, i32) {
        (
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }
}
