use std::collections::BTreeMap;

use engine::{
    Collider, DefDatabase, EntityId, InputSnapshot, Layer, LayerMask, Scene, SceneCommand,
    SceneWorld, Transform, Vec2,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::combat::{CombatTuning, Shot, Weapon};
use super::damage::{DamageCause, Health, HitOutcome, YieldTable};
use super::day_cycle::{DayContext, DayCycle, DayListener, DayResult, DayTimer};
use super::dwell::{DwellTuning, MotionSample};
use super::harvest::{AgentMode, HarvestTuning, Harvester};
use super::hostile::{HostileBrain, HostileProfile};
use super::inventory::{InventorySink, RunInventory};
use super::placement::{PlacementParams, PlacementQuery, SpawnArea};
use super::spawner::{
    scale_rules, DensityScale, PopulationSpawner, SpawnHost, SpawnRule, SpawnTicket,
};

const AGENT_RADIUS: f32 = 0.3;
// Forager stops this fraction of the action radius away from a node.
const FORAGER_STANDOFF: f32 = 0.5;
const MIN_DT_SECONDS: f32 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AgentDriver {
    /// Movement comes from the move actions of the input snapshot.
    Input,
    /// Walks to the nearest interactable and stands still next to it;
    /// switches to combat while a hostile is within weapon range.
    Forager,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ArenaSettings {
    pub(crate) arena: String,
    /// 0 keeps cycling days until the loop stops.
    pub(crate) days_to_run: u32,
    pub(crate) rng_seed: Option<u64>,
    pub(crate) driver: AgentDriver,
    pub(crate) dwell: DwellTuning,
    pub(crate) harvest: HarvestTuning,
    pub(crate) combat: CombatTuning,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum ArenaSetupError {
    #[error("content definitions are not loaded")]
    NoDefDatabase,
    #[error("unknown arena def '{0}'")]
    UnknownArena(String),
    #[error("arena '{arena}' references unknown spawn rule '{rule}'")]
    UnknownSpawnRule { arena: String, rule: String },
    #[error("spawn rule '{rule}' references unknown template '{template}'")]
    UnknownTemplate { rule: String, template: String },
    #[error("arena '{arena}' has an empty spawn area")]
    EmptyArea { arena: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct ArenaStats {
    pub(crate) harvest_hits: u32,
    pub(crate) nodes_harvested: u32,
    pub(crate) nodes_destroyed: u32,
    pub(crate) hostiles_defeated: u32,
    pub(crate) shots_fired: u32,
    pub(crate) agent_hits: u32,
    pub(crate) damage_taken: u32,
    pub(crate) days_completed: u32,
}

#[derive(Debug, Clone)]
enum Template {
    Interactable {
        max_hp: u32,
        radius: f32,
        yields: YieldTable,
    },
    Hostile {
        max_hp: u32,
        radius: f32,
        profile: HostileProfile,
    },
}

#[derive(Debug)]
struct InteractableActor {
    def_name: String,
    health: Health,
    yields: YieldTable,
    ticket: SpawnTicket,
}

#[derive(Debug)]
struct HostileActor {
    def_name: String,
    health: Health,
    brain: HostileBrain,
    ticket: SpawnTicket,
}

#[derive(Debug, Default)]
struct ArenaActors {
    templates: BTreeMap<String, Template>,
    interactables: BTreeMap<EntityId, InteractableActor>,
    hostiles: BTreeMap<EntityId, HostileActor>,
}

/// The spawner's view of the scene for one call.
struct ArenaHost<'a> {
    world: &'a mut SceneWorld,
    actors: &'a mut ArenaActors,
    agent: Option<Vec2>,
}

impl PlacementQuery for ArenaHost<'_> {
    fn agent_position(&self) -> Option<Vec2> {
        self.agent
    }

    fn is_blocked(&self, center: Vec2, radius: f32, mask: LayerMask) -> bool {
        self.world
            .any_overlap_circle_including_pending(center, radius, mask)
    }
}

impl SpawnHost for ArenaHost<'_> {
    fn instantiate(
        &mut self,
        template: &str,
        position: Vec2,
        ticket: SpawnTicket,
    ) -> Option<EntityId> {
        let id = match self.actors.templates.get(template)? {
            Template::Interactable {
                max_hp,
                radius,
                yields,
            } => {
                let id = self.world.spawn(
                    Transform::at(position),
                    Collider::circle(*radius),
                    Layer::Interactable,
                    template,
                );
                self.actors.interactables.insert(
                    id,
                    InteractableActor {
                        def_name: template.to_string(),
                        health: Health::new(*max_hp),
                        yields: yields.clone(),
                        ticket,
                    },
                );
                id
            }
            Template::Hostile {
                max_hp,
                radius,
                profile,
            } => {
                let id = self.world.spawn(
                    Transform::at(position),
                    Collider::circle(*radius),
                    Layer::Hostile,
                    template,
                );
                self.actors.hostiles.insert(
                    id,
                    HostileActor {
                        def_name: template.to_string(),
                        health: Health::new(*max_hp),
                        brain: HostileBrain::new(*profile),
                        ticket,
                    },
                );
                id
            }
        };
        Some(id)
    }

    fn despawn(&mut self, entity: EntityId) {
        self.actors.interactables.remove(&entity);
        self.actors.hostiles.remove(&entity);
        self.world.despawn(entity);
    }
}

#[derive(Debug, Clone, Copy)]
struct Agent {
    id: EntityId,
    position: Vec2,
    velocity: Vec2,
    mode: AgentMode,
    move_speed: f32,
}

struct ArenaRuntime {
    arena_name: String,
    area: SpawnArea,
    agent: Agent,
    harvester: Harvester,
    weapon: Weapon,
    spawner: PopulationSpawner,
    inventory: RunInventory,
    cycle: DayCycle,
    timer: DayTimer,
    actors: ArenaActors,
    loot_rng: StdRng,
    start_next_day: bool,
}

impl ArenaRuntime {
    fn build(
        settings: &ArenaSettings,
        world: &mut SceneWorld,
    ) -> Result<Self, ArenaSetupError> {
        let def_database = world.def_database().ok_or(ArenaSetupError::NoDefDatabase)?;
        let (arena, rules, templates) = resolve_arena(settings, def_database)?;
        let density = (arena.density_factor > 1.0).then(|| DensityScale {
            factor: arena.density_factor,
            rounding: arena.density_rounding,
            min: arena.density_min,
        });

        let area = SpawnArea::new(arena.area_min, arena.area_max);
        if area.is_empty() {
            warn!(
                error = %ArenaSetupError::EmptyArea {
                    arena: arena.def_name.clone(),
                },
                "arena_setup_degraded"
            );
        }

        for obstacle in &arena.obstacles {
            world.spawn(
                Transform::at(obstacle.center),
                Collider::rect(obstacle.half_extents.x, obstacle.half_extents.y),
                Layer::Obstacle,
                "obstacle",
            );
        }
        let agent_start = area.clamp(arena.agent_start);
        let agent_id = world.spawn(
            Transform::at(agent_start),
            Collider::circle(AGENT_RADIUS),
            Layer::Agent,
            "agent",
        );

        let (spawn_rng, loot_rng) = match settings.rng_seed {
            Some(seed) => (
                StdRng::seed_from_u64(seed),
                StdRng::seed_from_u64(seed.wrapping_add(1)),
            ),
            None => (StdRng::from_os_rng(), StdRng::from_os_rng()),
        };
        let params = PlacementParams {
            max_tries: arena.max_placement_tries,
            min_distance_from_agent: arena.min_distance_from_agent,
            footprint_radius: arena.footprint_radius,
            ..PlacementParams::default()
        };

        info!(
            arena = arena.def_name.as_str(),
            rules = rules.len(),
            obstacles = arena.obstacles.len(),
            seeded = settings.rng_seed.is_some(),
            "arena_built"
        );

        let mut spawner = PopulationSpawner::new(rules, area, params, spawn_rng);
        if let Some(scale) = density {
            let scaled = scale_rules(spawner.rules(), scale);
            spawner.set_rules(scaled);
            info!(factor = scale.factor, "arena_density_scaled");
        }

        Ok(Self {
            arena_name: arena.def_name.clone(),
            area,
            agent: Agent {
                id: agent_id,
                position: agent_start,
                velocity: Vec2::ZERO,
                mode: AgentMode::Harvest,
                move_speed: arena.agent_move_speed,
            },
            harvester: Harvester::new(settings.dwell, settings.harvest),
            weapon: Weapon::new(settings.combat),
            spawner,
            inventory: RunInventory::default(),
            cycle: DayCycle::new(arena.despawn_on_day_end),
            timer: DayTimer::new(arena.seconds_per_day),
            actors: ArenaActors {
                templates,
                ..ArenaActors::default()
            },
            loot_rng,
            start_next_day: false,
        })
    }

    fn with_day<R>(
        &mut self,
        world: &mut SceneWorld,
        f: impl FnOnce(&mut DayCycle, DayContext<'_, ArenaHost<'_>>) -> R,
    ) -> R {
        let mut host = ArenaHost {
            world,
            actors: &mut self.actors,
            agent: Some(self.agent.position),
        };
        let ctx = DayContext {
            spawner: &mut self.spawner,
            harvester: &mut self.harvester,
            inventory: &mut self.inventory,
            host: &mut host,
        };
        f(&mut self.cycle, ctx)
    }

    fn start_day(&mut self, world: &mut SceneWorld) {
        self.timer.start();
        self.open_day(world);
    }

    fn next_day(&mut self, world: &mut SceneWorld) {
        self.timer.next_day();
        self.open_day(world);
    }

    fn open_day(&mut self, world: &mut SceneWorld) {
        self.with_day(world, |cycle, ctx| cycle.start_day(ctx));
        debug!(
            day = self.timer.day_number(),
            seconds_per_day = self.timer.seconds_per_day(),
            "day_timer_started"
        );
    }

    fn hostile_positions<'w>(
        &'w self,
        world: &'w SceneWorld,
    ) -> impl Iterator<Item = (EntityId, Vec2)> + 'w {
        self.actors.hostiles.keys().filter_map(|id| {
            world
                .find_entity(*id)
                .map(|entity| (*id, entity.transform.position))
        })
    }

    /// Forager autopilot: fight while a hostile is within weapon range.
    fn choose_forager_mode(&mut self, world: &SceneWorld) {
        let threat = self
            .weapon
            .nearest_in_range(self.agent.position, self.hostile_positions(world));
        let mode = if threat.is_some() {
            AgentMode::Combat
        } else {
            AgentMode::Harvest
        };
        if mode != self.agent.mode {
            self.agent.mode = mode;
            info!(mode = ?mode, "agent_mode_changed");
        }
    }

    fn fire_weapon(&mut self, dt: f32, world: &SceneWorld) -> Option<Shot> {
        let target = self
            .weapon
            .nearest_in_range(self.agent.position, self.hostile_positions(world));
        self.weapon.tick(dt, self.agent.mode, target)
    }

    fn move_agent(
        &mut self,
        dt: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
        driver: AgentDriver,
    ) {
        let previous = self.agent.position;
        let target = match driver {
            AgentDriver::Input => {
                let (x, y) = input.move_axis();
                previous + Vec2::new(x, y) * (self.agent.move_speed * dt)
            }
            AgentDriver::Forager => self.forage_step(dt, world),
        };
        let position = self.area.clamp(target);
        self.agent.velocity = (position - previous) * (1.0 / dt.max(MIN_DT_SECONDS));
        self.agent.position = position;
        if let Some(entity) = world.find_entity_mut(self.agent.id) {
            entity.transform.position = position;
        }
    }

    fn forage_step(&self, dt: f32, world: &SceneWorld) -> Vec2 {
        let position = self.agent.position;
        if self.agent.mode != AgentMode::Harvest {
            return position;
        }
        let nearest = self
            .actors
            .interactables
            .keys()
            .filter_map(|id| world.spatial().closest_point(*id, position))
            .min_by(|a, b| {
                a.distance_squared(position)
                    .total_cmp(&b.distance_squared(position))
            });
        let Some(point) = nearest else {
            return position;
        };

        let standoff = self.harvester.tuning().action_radius.max(0.0) * FORAGER_STANDOFF;
        let distance = point.distance(position);
        if distance <= standoff {
            return position;
        }
        let travel = (self.agent.move_speed.max(0.0) * dt).min(distance - standoff);
        position + (point - position).normalized_or_zero() * travel
    }

    fn apply_hit(
        &mut self,
        world: &mut SceneWorld,
        id: EntityId,
        amount: u32,
        cause: DamageCause,
        stats: &mut ArenaStats,
    ) -> HitOutcome {
        if let Some(actor) = self.actors.interactables.get_mut(&id) {
            let outcome = actor.health.apply_damage(amount, cause);
            match outcome {
                HitOutcome::Damaged { remaining } => debug!(
                    entity = id.0,
                    remaining,
                    max = actor.health.max(),
                    cause = ?cause,
                    "interactable_damaged"
                ),
                HitOutcome::Destroyed { harvested } => {
                    if let Some(actor) = self.actors.interactables.remove(&id) {
                        self.destroy_interactable(world, id, actor, harvested, stats);
                    }
                }
                HitOutcome::Ignored => {}
            }
            return outcome;
        }

        if let Some(actor) = self.actors.hostiles.get_mut(&id) {
            let outcome = actor.health.apply_damage(amount, cause);
            if matches!(outcome, HitOutcome::Destroyed { .. }) {
                if let Some(actor) = self.actors.hostiles.remove(&id) {
                    world.despawn(id);
                    self.spawner.release(actor.ticket);
                    stats.hostiles_defeated = stats.hostiles_defeated.saturating_add(1);
                    info!(entity = id.0, hostile = actor.def_name.as_str(), cause = ?cause, "hostile_defeated");
                }
            }
            return outcome;
        }

        HitOutcome::Ignored
    }

    fn destroy_interactable(
        &mut self,
        world: &mut SceneWorld,
        id: EntityId,
        actor: InteractableActor,
        harvested: bool,
        stats: &mut ArenaStats,
    ) {
        world.despawn(id);
        self.spawner.release(actor.ticket);
        stats.nodes_destroyed = stats.nodes_destroyed.saturating_add(1);

        let mut dropped = 0u32;
        if harvested {
            for drop in actor.yields.roll(&mut self.loot_rng) {
                dropped = dropped.saturating_add(drop.count);
                self.inventory.add(&drop.item_id, drop.count);
            }
            stats.nodes_harvested = stats.nodes_harvested.saturating_add(1);
        }
        info!(
            entity = id.0,
            interactable = actor.def_name.as_str(),
            cause = ?actor.health.last_cause(),
            harvested,
            dropped,
            "interactable_destroyed"
        );
        self.cycle.notify_removed();
    }

    fn update_hostiles(&mut self, dt: f32, world: &mut SceneWorld, stats: &mut ArenaStats) {
        let agent = Some(self.agent.position);
        for (id, actor) in &mut self.actors.hostiles {
            let Some(entity) = world.find_entity_mut(*id) else {
                continue;
            };
            let step = actor.brain.update(dt, entity.transform.position, agent);
            entity.transform.position = self.area.clamp(step.position);
            if let Some(damage) = step.attack {
                stats.agent_hits = stats.agent_hits.saturating_add(1);
                stats.damage_taken = stats.damage_taken.saturating_add(damage);
                debug!(entity = id.0, damage, "agent_hit");
            }
        }
    }
}

type ResolvedArena = (engine::ArenaDef, Vec<SpawnRule>, BTreeMap<String, Template>);

fn resolve_arena(
    settings: &ArenaSettings,
    def_database: &DefDatabase,
) -> Result<ResolvedArena, ArenaSetupError> {
    let arena = def_database
        .arena(&settings.arena)
        .ok_or_else(|| ArenaSetupError::UnknownArena(settings.arena.clone()))?
        .clone();

    let mut rules = Vec::new();
    let mut templates = BTreeMap::new();
    for rule_name in &arena.spawn_rules {
        let Some(def) = def_database.spawn_rule(rule_name) else {
            warn!(
                error = %ArenaSetupError::UnknownSpawnRule {
                    arena: arena.def_name.clone(),
                    rule: rule_name.clone(),
                },
                "arena_setup_degraded"
            );
            continue;
        };
        let template = if let Some(node) = def_database.interactable(&def.template) {
            Template::Interactable {
                max_hp: node.max_hp,
                radius: node.radius,
                yields: YieldTable::from_def(node),
            }
        } else if let Some(hostile) = def_database.hostile(&def.template) {
            Template::Hostile {
                max_hp: hostile.max_hp,
                radius: hostile.radius,
                profile: HostileProfile::from_def(hostile),
            }
        } else {
            warn!(
                error = %ArenaSetupError::UnknownTemplate {
                    rule: def.def_name.clone(),
                    template: def.template.clone(),
                },
                "arena_setup_degraded"
            );
            continue;
        };
        templates.insert(def.template.clone(), template);
        rules.push(SpawnRule::from_def(def));
    }

    Ok((arena, rules, templates))
}

/// Headless arena session: one agent, the population spawner and the day
/// cycle, wired onto the engine scene loop.
pub(crate) struct ArenaScene {
    settings: ArenaSettings,
    runtime: Option<ArenaRuntime>,
    setup_error: Option<ArenaSetupError>,
    pending_listeners: Vec<DayListener>,
    day_results: Vec<DayResult>,
    loot_totals: BTreeMap<String, u32>,
    stats: ArenaStats,
}

impl ArenaScene {
    pub(crate) fn new(settings: ArenaSettings) -> Self {
        Self {
            settings,
            runtime: None,
            setup_error: None,
            pending_listeners: Vec::new(),
            day_results: Vec::new(),
            loot_totals: BTreeMap::new(),
            stats: ArenaStats::default(),
        }
    }

    /// Registers a day listener. Listeners added before `load` are handed to
    /// the day cycle when the arena is built.
    pub(crate) fn subscribe(&mut self, listener: DayListener) {
        match self.runtime.as_mut() {
            Some(runtime) => runtime.cycle.subscribe(listener),
            None => self.pending_listeners.push(listener),
        }
    }

    pub(crate) fn stats(&self) -> ArenaStats {
        self.stats
    }

    /// Lifetime loot. Live while the arena runs; kept after `unload`.
    pub(crate) fn loot_totals(&self) -> &BTreeMap<String, u32> {
        match self.runtime.as_ref() {
            Some(runtime) => runtime.inventory.totals(),
            None => &self.loot_totals,
        }
    }

    #[cfg(test)]
    pub(crate) fn day_results(&self) -> &[DayResult] {
        &self.day_results
    }

    pub(crate) fn setup_error(&self) -> Option<&ArenaSetupError> {
        self.setup_error.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn is_inert(&self) -> bool {
        self.runtime.is_none()
    }

    #[cfg(test)]
    pub(crate) fn inventory(&self) -> Option<&RunInventory> {
        self.runtime.as_ref().map(|runtime| &runtime.inventory)
    }

    #[cfg(test)]
    pub(crate) fn agent_mode(&self) -> Option<AgentMode> {
        self.runtime.as_ref().map(|runtime| runtime.agent.mode)
    }

    #[cfg(test)]
    pub(crate) fn dwell_phase(&self) -> Option<super::dwell::DwellPhase> {
        self.runtime
            .as_ref()
            .map(|runtime| runtime.harvester.phase())
    }

    #[cfg(test)]
    pub(crate) fn day_phase(&self) -> Option<super::day_cycle::DayPhase> {
        self.runtime.as_ref().map(|runtime| runtime.cycle.phase())
    }

    #[cfg(test)]
    pub(crate) fn spawner(&self) -> Option<&PopulationSpawner> {
        self.runtime.as_ref().map(|runtime| &runtime.spawner)
    }

    #[cfg(test)]
    pub(crate) fn interactable_ids(&self) -> Vec<EntityId> {
        self.runtime
            .as_ref()
            .map(|runtime| runtime.actors.interactables.keys().copied().collect())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn hostile_ids(&self) -> Vec<EntityId> {
        self.runtime
            .as_ref()
            .map(|runtime| runtime.actors.hostiles.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Lands a hit from outside the tick loop.
    #[cfg(test)]
    pub(crate) fn apply_hit(
        &mut self,
        world: &mut SceneWorld,
        id: EntityId,
        amount: u32,
        cause: DamageCause,
    ) -> HitOutcome {
        match self.runtime.as_mut() {
            Some(runtime) => runtime.apply_hit(world, id, amount, cause, &mut self.stats),
            None => HitOutcome::Ignored,
        }
    }

    fn finish_day(&mut self, world: &mut SceneWorld) -> bool {
        let Some(runtime) = self.runtime.as_mut() else {
            return false;
        };
        let Some(result) = runtime.with_day(world, |cycle, ctx| cycle.end_day(ctx)) else {
            return false;
        };
        match serde_json::to_string(&result) {
            Ok(json) => info!(day = result.day_index, result = %json, "day_result"),
            Err(err) => warn!(day = result.day_index, error = %err, "day_result_encode_failed"),
        }
        self.stats.days_completed = self.stats.days_completed.saturating_add(1);
        self.day_results.push(result);
        true
    }
}

impl Scene for ArenaScene {
    fn load(&mut self, world: &mut SceneWorld) {
        match ArenaRuntime::build(&self.settings, world) {
            Ok(mut runtime) => {
                for listener in self.pending_listeners.drain(..) {
                    runtime.cycle.subscribe(listener);
                }
                runtime.start_day(world);
                self.runtime = Some(runtime);
            }
            Err(err) => {
                warn!(arena = self.settings.arena.as_str(), error = %err, "arena_inert");
                self.setup_error = Some(err);
            }
        }
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        let dt = fixed_dt_seconds;
        let driver = self.settings.driver;
        let Some(runtime) = self.runtime.as_mut() else {
            return SceneCommand::Quit;
        };

        if runtime.start_next_day {
            runtime.start_next_day = false;
            runtime.next_day(world);
        }

        match driver {
            AgentDriver::Input => {
                if input.toggle_mode_pressed() {
                    runtime.agent.mode = runtime.agent.mode.toggled();
                    info!(mode = ?runtime.agent.mode, "agent_mode_changed");
                }
            }
            AgentDriver::Forager => runtime.choose_forager_mode(world),
        }

        runtime.move_agent(dt, input, world, driver);
        runtime.with_day(world, |cycle, ctx| cycle.tick(dt, ctx));

        let sample = MotionSample {
            position: runtime.agent.position,
            velocity: Some(runtime.agent.velocity),
            dt,
        };
        let targets = runtime
            .harvester
            .tick(sample, runtime.agent.mode, world.spatial());
        let damage = runtime.harvester.tuning().damage_per_tick;
        for id in targets {
            self.stats.harvest_hits = self.stats.harvest_hits.saturating_add(1);
            runtime.apply_hit(world, id, damage, DamageCause::Harvest, &mut self.stats);
        }

        if let Some(shot) = runtime.fire_weapon(dt, world) {
            self.stats.shots_fired = self.stats.shots_fired.saturating_add(1);
            runtime.apply_hit(world, shot.target, shot.damage, shot.cause, &mut self.stats);
        }

        runtime.update_hostiles(dt, world, &mut self.stats);

        if !runtime.timer.tick(dt) {
            return SceneCommand::None;
        }
        self.finish_day(world);
        let days_to_run = self.settings.days_to_run;
        if days_to_run > 0 && self.stats.days_completed >= days_to_run {
            info!(
                days = self.stats.days_completed,
                stats = ?self.stats,
                "run_complete"
            );
            return SceneCommand::Quit;
        }
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.start_next_day = true;
        }
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.timer.stop();
        }
        if self.finish_day(world) {
            info!(days = self.stats.days_completed, "partial_day_recorded");
        }
        if let Some(runtime) = self.runtime.take() {
            self.loot_totals = runtime.inventory.totals().clone();
        }
        world.clear();
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        let runtime = self.runtime.as_ref()?;
        let loot: u32 = runtime.inventory.totals().values().sum();
        Some(format!(
            "{} | day {} {:?} | {:.1}s left | alive {} | loot {}",
            runtime.arena_name,
            runtime.cycle.day_index(),
            runtime.cycle.phase(),
            runtime.timer.time_left(),
            runtime.spawner.total_alive(),
            loot
        ))
    }
}
