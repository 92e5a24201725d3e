use std::ops::{Add, Mul, Sub};

use super::input::InputSnapshot;
use super::spatial::{Collider, Layer, LayerMask, SpatialIndex};
use crate::content::DefDatabase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn distance_squared(self, other: Self) -> f32 {
        (other - self).length_squared()
    }

    pub fn distance(self, other: Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Returns the zero vector for inputs too short to normalize.
    pub fn normalized_or_zero(self) -> Self {
        let len_sq = self.length_squared();
        if len_sq <= f32::EPSILON {
            return Self::ZERO;
        }
        self * len_sq.sqrt().recip()
    }

    pub fn clamp(self, min: Self, max: Self) -> Self {
        Self {
            x: self.x.clamp(min.x, max.x),
            y: self.y.clamp(min.y, max.y),
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: Vec2,
}

impl Transform {
    pub const fn at(position: Vec2) -> Self {
        Self { position }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub transform: Transform,
    pub collider: Collider,
    pub layer: Layer,
    pub debug_name: String,
    applied_spawn_order: u64,
}

impl Entity {
    pub fn applied_spawn_order(&self) -> u64 {
        self.applied_spawn_order
    }
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Entity store with deferred mutation.
///
/// `spawn` and `despawn` only queue work; `apply_pending` commits it between
/// ticks and rebuilds the spatial index, so queries made during a tick always
/// see the world exactly as it was when the tick began.
#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    next_applied_spawn_order: u64,
    spatial: SpatialIndex,
    def_database: Option<DefDatabase>,
}

impl SceneWorld {
    pub fn spawn(
        &mut self,
        transform: Transform,
        collider: Collider,
        layer: Layer,
        debug_name: impl Into<String>,
    ) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            transform,
            collider,
            layer,
            debug_name: debug_name.into(),
            applied_spawn_order: 0,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let exists_now = self.entities.iter().any(|entity| entity.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|entity| entity.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_spawns.is_empty() {
            for mut entity in self.pending_spawns.drain(..) {
                entity.applied_spawn_order = self.next_applied_spawn_order;
                self.next_applied_spawn_order = self.next_applied_spawn_order.saturating_add(1);
                self.entities.push(entity);
            }
        }

        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort();
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.entities
                .retain(|entity| pending.binary_search(&entity.id).is_err());
            self.pending_despawns.clear();
        }

        // Transforms may have moved during the tick even without spawns.
        self.spatial.rebuild(&self.entities);
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.next_applied_spawn_order = 0;
        self.spatial.rebuild(&self.entities);
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn pending_spawn_count(&self) -> usize {
        self.pending_spawns.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Overlap test against committed entities plus footprints queued this
    /// tick. Pending despawns still block until they are applied.
    pub fn any_overlap_circle_including_pending(
        &self,
        center: Vec2,
        radius: f32,
        mask: LayerMask,
    ) -> bool {
        if self.spatial.any_overlap_circle(center, radius, mask) {
            return true;
        }
        self.pending_spawns.iter().any(|entity| {
            mask.contains(entity.layer)
                && entity
                    .collider
                    .overlaps_circle(entity.transform.position, center, radius)
        })
    }

    pub fn set_def_database(&mut self, def_database: DefDatabase) {
        self.def_database = Some(def_database);
    }

    pub fn def_database(&self) -> Option<&DefDatabase> {
        self.def_database.as_ref()
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
}
