use std::cell::RefCell;
use std::rc::Rc;

use engine::{
    ArenaDef, DefDatabase, DensityRounding, HostileDef, InputSnapshot, InteractableDef,
    ObstacleDef, RefillDef, Scene, SceneCommand, SceneWorld, SpawnRuleDef, Vec2, YieldEntryDef,
};

use super::arena::ArenaSetupError;
use super::damage::{DamageCause, HitOutcome};
use super::dwell::DwellPhase;
use super::harvest::AgentMode;
use super::*;

const DT: f32 = 1.0 / 60.0;

fn rock() -> InteractableDef {
    InteractableDef {
        def_name: "node.rock".to_string(),
        label: "Rock".to_string(),
        max_hp: 3,
        radius: 0.3,
        yield_rolls: 1,
        yields: vec![YieldEntryDef {
            item_id: "stone".to_string(),
            min: 1,
            max: 2,
            weight: 1.0,
        }],
    }
}

fn flint() -> InteractableDef {
    InteractableDef {
        def_name: "node.flint".to_string(),
        label: "Flint".to_string(),
        yields: vec![YieldEntryDef {
            item_id: "flint".to_string(),
            min: 1,
            max: 1,
            weight: 1.0,
        }],
        ..rock()
    }
}

fn slime() -> HostileDef {
    HostileDef {
        def_name: "hostile.slime".to_string(),
        label: "Slime".to_string(),
        max_hp: 2,
        radius: 0.3,
        sight_radius: 4.0,
        move_speed: 1.5,
        stop_distance: 0.6,
        attack_range: 0.8,
        attack_cooldown_seconds: 1.0,
        damage: 1,
    }
}

fn stock_rule() -> SpawnRuleDef {
    SpawnRuleDef {
        def_name: "stock.rock".to_string(),
        template: "node.rock".to_string(),
        initial_burst: 3,
        daily_cap: 0,
        max_alive: 3,
        interval_seconds: 0.0,
        respawn: false,
        refill: Some(RefillDef { floor: 3, batch: 1 }),
    }
}

fn single_flint_rule() -> SpawnRuleDef {
    SpawnRuleDef {
        def_name: "stock.flint".to_string(),
        template: "node.flint".to_string(),
        initial_burst: 1,
        max_alive: 1,
        refill: None,
        ..stock_rule()
    }
}

fn loose_stock_rule() -> SpawnRuleDef {
    SpawnRuleDef {
        def_name: "stock.loose".to_string(),
        max_alive: 0,
        ..stock_rule()
    }
}

fn wave_rule() -> SpawnRuleDef {
    SpawnRuleDef {
        def_name: "wave.slime".to_string(),
        template: "hostile.slime".to_string(),
        initial_burst: 0,
        daily_cap: 0,
        max_alive: 2,
        interval_seconds: 0.5,
        respawn: true,
        refill: None,
    }
}

fn arena(name: &str, spawn_rules: &[&str]) -> ArenaDef {
    ArenaDef {
        def_name: name.to_string(),
        label: name.to_string(),
        area_min: Vec2::new(0.0, 0.0),
        area_max: Vec2::new(10.0, 10.0),
        agent_start: Vec2::new(5.0, 5.0),
        agent_move_speed: 3.0,
        spawn_rules: spawn_rules.iter().map(|rule| rule.to_string()).collect(),
        obstacles: Vec::new(),
        max_placement_tries: 24,
        min_distance_from_agent: 2.0,
        footprint_radius: 0.3,
        seconds_per_day: 100.0,
        despawn_on_day_end: true,
        density_factor: 1.0,
        density_rounding: DensityRounding::Ceil,
        density_min: 1,
    }
}

fn world_with(arenas: Vec<ArenaDef>) -> SceneWorld {
    let mut builder = DefDatabase::builder()
        .interactable(rock())
        .interactable(flint())
        .hostile(slime())
        .spawn_rule(stock_rule())
        .spawn_rule(single_flint_rule())
        .spawn_rule(loose_stock_rule())
        .spawn_rule(wave_rule());
    for arena in arenas {
        builder = builder.arena(arena);
    }
    let mut world = SceneWorld::default();
    world.set_def_database(builder.build());
    world
}

fn settings(arena: &str, driver: AgentDriver) -> ArenaSettings {
    ArenaSettings {
        arena: arena.to_string(),
        days_to_run: 0,
        rng_seed: Some(7),
        driver,
        dwell: DwellTuning::default(),
        harvest: HarvestTuning::default(),
        combat: CombatTuning::default(),
    }
}

fn loaded(settings: ArenaSettings, world: &mut SceneWorld) -> ArenaScene {
    let mut scene = ArenaScene::new(settings);
    scene.load(world);
    world.apply_pending();
    scene
}

fn step(scene: &mut ArenaScene, world: &mut SceneWorld, input: &InputSnapshot) -> SceneCommand {
    let command = scene.update(DT, input, world);
    world.apply_pending();
    command
}

fn run_ticks(scene: &mut ArenaScene, world: &mut SceneWorld, ticks: usize) {
    let input = InputSnapshot::empty();
    for _ in 0..ticks {
        step(scene, world, &input);
    }
}

#[test]
fn forager_harvests_nodes_into_inventory() {
    let mut world = world_with(vec![arena("arena.test", &["stock.rock"])]);
    let mut scene = loaded(settings("arena.test", AgentDriver::Forager), &mut world);
    assert_eq!(scene.interactable_ids().len(), 3);

    run_ticks(&mut scene, &mut world, 20 * 60);

    let stats = scene.stats();
    assert!(stats.nodes_harvested >= 1, "stats = {stats:?}");
    assert!(stats.harvest_hits >= 3);
    let inventory = scene.inventory().expect("runtime");
    assert!(inventory.total_count("stone") >= stats.nodes_harvested);
    assert_eq!(scene.loot_totals(), inventory.totals());
}

#[test]
fn three_harvest_ticks_break_a_node_with_one_yield_roll() {
    let mut world = world_with(vec![arena("arena.flint", &["stock.flint"])]);
    let mut scene = loaded(settings("arena.flint", AgentDriver::Forager), &mut world);
    assert_eq!(scene.interactable_ids().len(), 1);

    run_ticks(&mut scene, &mut world, 10 * 60);

    let stats = scene.stats();
    assert_eq!(stats.harvest_hits, 3, "stats = {stats:?}");
    assert_eq!(stats.nodes_harvested, 1);
    assert!(scene.interactable_ids().is_empty());
    assert_eq!(scene.loot_totals().get("flint"), Some(&1));
}

#[test]
fn only_harvest_kills_drop_loot() {
    let mut world = world_with(vec![arena("arena.test", &["stock.rock"])]);
    let mut scene = loaded(settings("arena.test", AgentDriver::Input), &mut world);
    let ids = scene.interactable_ids();

    let outcome = scene.apply_hit(&mut world, ids[0], 1, DamageCause::Projectile);
    assert_eq!(outcome, HitOutcome::Damaged { remaining: 2 });

    let outcome = scene.apply_hit(&mut world, ids[0], 10, DamageCause::Explosion);
    assert_eq!(outcome, HitOutcome::Destroyed { harvested: false });
    assert_eq!(scene.inventory().expect("runtime").total_count("stone"), 0);

    let outcome = scene.apply_hit(&mut world, ids[1], 10, DamageCause::Harvest);
    assert_eq!(outcome, HitOutcome::Destroyed { harvested: true });
    assert!(scene.inventory().expect("runtime").total_count("stone") >= 1);

    let outcome = scene.apply_hit(&mut world, ids[1], 10, DamageCause::Harvest);
    assert_eq!(outcome, HitOutcome::Ignored);
    assert_eq!(scene.stats().nodes_destroyed, 2);
    assert_eq!(scene.stats().nodes_harvested, 1);
}

#[test]
fn destroyed_node_is_refilled_on_the_next_tick() {
    let mut world = world_with(vec![arena("arena.test", &["stock.rock"])]);
    let mut scene = loaded(settings("arena.test", AgentDriver::Input), &mut world);
    let ids = scene.interactable_ids();
    assert_eq!(ids.len(), 3);

    scene.apply_hit(&mut world, ids[0], 10, DamageCause::Generic);
    world.apply_pending();
    assert_eq!(scene.spawner().expect("runtime").alive_count(0), 2);
    assert!(world.find_entity(ids[0]).is_none());

    run_ticks(&mut scene, &mut world, 1);
    assert_eq!(scene.spawner().expect("runtime").alive_count(0), 3);
    assert_eq!(scene.interactable_ids().len(), 3);
    assert!(!scene.interactable_ids().contains(&ids[0]));
}

#[test]
fn stock_resets_to_initial_burst_on_days_without_despawn() {
    let mut kept = arena("arena.kept", &["stock.loose"]);
    kept.despawn_on_day_end = false;
    kept.seconds_per_day = 0.5;
    let mut world = world_with(vec![kept]);
    let mut scene = loaded(settings("arena.kept", AgentDriver::Input), &mut world);
    assert_eq!(scene.interactable_ids().len(), 3);

    run_ticks(&mut scene, &mut world, 150);

    assert!(scene.day_results().len() >= 4, "days = {}", scene.day_results().len());
    assert_eq!(scene.interactable_ids().len(), 3);
    assert_eq!(scene.spawner().expect("runtime").alive_count(0), 3);
    assert_eq!(world.entity_count(), 4);
}

#[test]
fn forager_shoots_hostiles_that_come_into_range() {
    let mut small = arena("arena.small", &["wave.slime"]);
    small.area_max = Vec2::new(4.0, 4.0);
    small.agent_start = Vec2::new(2.0, 2.0);
    let mut world = world_with(vec![small]);
    let mut scene = loaded(settings("arena.small", AgentDriver::Forager), &mut world);

    run_ticks(&mut scene, &mut world, 30 * 60);

    let stats = scene.stats();
    assert!(stats.shots_fired >= 1, "stats = {stats:?}");
    assert!(stats.hostiles_defeated >= 1, "stats = {stats:?}");
    assert_eq!(stats.harvest_hits, 0);
}

#[test]
fn hostile_wave_never_exceeds_max_alive() {
    let mut world = world_with(vec![arena("arena.test", &["wave.slime"])]);
    let mut scene = loaded(settings("arena.test", AgentDriver::Input), &mut world);
    let input = InputSnapshot::empty();
    let mut peak = 0;

    for _ in 0..(30 * 60) {
        step(&mut scene, &mut world, &input);
        let alive = scene.hostile_ids().len();
        assert!(alive <= 2, "alive = {alive}");
        peak = peak.max(alive);
    }

    assert_eq!(peak, 2);
    let spawner = scene.spawner().expect("runtime");
    assert_eq!(spawner.alive_count(0), 2);
}

#[test]
fn defeated_hostile_frees_its_slot() {
    let mut world = world_with(vec![arena("arena.test", &["wave.slime"])]);
    let mut scene = loaded(settings("arena.test", AgentDriver::Input), &mut world);
    run_ticks(&mut scene, &mut world, 2 * 60);
    let hostiles = scene.hostile_ids();
    assert_eq!(hostiles.len(), 2);

    let outcome = scene.apply_hit(&mut world, hostiles[0], 5, DamageCause::Projectile);
    assert_eq!(outcome, HitOutcome::Destroyed { harvested: false });
    world.apply_pending();
    assert_eq!(scene.stats().hostiles_defeated, 1);
    assert_eq!(scene.spawner().expect("runtime").alive_count(0), 1);

    run_ticks(&mut scene, &mut world, 60);
    assert_eq!(scene.hostile_ids().len(), 2);
}

#[test]
fn fully_blocked_arena_spawns_nothing() {
    let mut blocked = arena("arena.blocked", &["stock.rock", "wave.slime"]);
    blocked.obstacles = vec![ObstacleDef {
        center: Vec2::new(5.0, 5.0),
        half_extents: Vec2::new(6.0, 6.0),
    }];
    let mut world = world_with(vec![blocked]);
    let mut scene = loaded(settings("arena.blocked", AgentDriver::Input), &mut world);

    run_ticks(&mut scene, &mut world, 5 * 60);

    assert!(scene.interactable_ids().is_empty());
    assert!(scene.hostile_ids().is_empty());
    let metrics = scene.spawner().expect("runtime").metrics();
    assert_eq!(metrics.total_alive(), 0);
    assert!(metrics.rules.iter().all(|rule| rule.placement_failures > 0));
}

#[test]
fn run_quits_after_configured_days() {
    let mut short = arena("arena.short", &["stock.rock"]);
    short.seconds_per_day = 1.0;
    let mut world = world_with(vec![short]);
    let mut settings = settings("arena.short", AgentDriver::Forager);
    settings.days_to_run = 2;
    let mut scene = loaded(settings, &mut world);
    let input = InputSnapshot::empty();

    let mut quit_at = None;
    for tick in 0..(5 * 60) {
        if step(&mut scene, &mut world, &input) == SceneCommand::Quit {
            quit_at = Some(tick);
            break;
        }
    }

    assert!(quit_at.is_some());
    let days: Vec<u32> = scene.day_results().iter().map(|day| day.day_index).collect();
    assert_eq!(days, vec![1, 2]);
    assert_eq!(scene.stats().days_completed, 2);
    assert!(scene
        .day_results()
        .iter()
        .all(|day| day.population.total_spawned_today() >= 3));
}

#[test]
fn unknown_arena_leaves_scene_inert() {
    let mut world = world_with(vec![arena("arena.test", &["stock.rock"])]);
    let mut scene = loaded(settings("arena.missing", AgentDriver::Forager), &mut world);

    assert!(scene.is_inert());
    assert_eq!(
        scene.setup_error(),
        Some(&ArenaSetupError::UnknownArena("arena.missing".to_string()))
    );
    assert_eq!(world.entity_count(), 0);
    assert_eq!(
        step(&mut scene, &mut world, &InputSnapshot::empty()),
        SceneCommand::Quit
    );
}

#[test]
fn missing_def_database_leaves_scene_inert() {
    let mut world = SceneWorld::default();
    let scene = loaded(settings("arena.test", AgentDriver::Forager), &mut world);
    assert_eq!(scene.setup_error(), Some(&ArenaSetupError::NoDefDatabase));
}

#[test]
fn unknown_rule_is_dropped_and_the_rest_still_runs() {
    let mut world = world_with(vec![arena("arena.test", &["stock.ghost", "stock.rock"])]);
    let scene = loaded(settings("arena.test", AgentDriver::Input), &mut world);

    assert!(!scene.is_inert());
    assert_eq!(scene.spawner().expect("runtime").rules().len(), 1);
    assert_eq!(scene.interactable_ids().len(), 3);
}

#[test]
fn density_factor_scales_stock_rules_only() {
    let mut dense = arena("arena.dense", &["stock.rock", "wave.slime"]);
    dense.density_factor = 2.0;
    let mut world = world_with(vec![dense]);
    let scene = loaded(settings("arena.dense", AgentDriver::Input), &mut world);

    let rules = scene.spawner().expect("runtime").rules();
    assert_eq!(rules[0].initial_burst, 6);
    assert_eq!(rules[0].refill.map(|refill| refill.floor), Some(6));
    assert_eq!(rules[1].max_alive, 2);
}

#[test]
fn toggling_to_combat_resets_dwell_and_stops_harvest() {
    let mut world = world_with(vec![arena("arena.test", &["stock.rock"])]);
    let mut scene = loaded(settings("arena.test", AgentDriver::Input), &mut world);
    run_ticks(&mut scene, &mut world, 30);
    assert_eq!(scene.dwell_phase(), Some(DwellPhase::Settling));

    let toggle = InputSnapshot::empty().with_toggle_mode_pressed(true);
    step(&mut scene, &mut world, &toggle);
    assert_eq!(scene.agent_mode(), Some(AgentMode::Combat));
    assert_eq!(scene.dwell_phase(), Some(DwellPhase::Moving));

    run_ticks(&mut scene, &mut world, 60);
    assert_eq!(scene.dwell_phase(), Some(DwellPhase::Moving));
    assert_eq!(scene.stats().harvest_hits, 0);
}

#[test]
fn listeners_see_every_day_boundary() {
    let mut short = arena("arena.short", &["stock.rock"]);
    short.seconds_per_day = 0.5;
    let mut world = world_with(vec![short]);
    let mut settings = settings("arena.short", AgentDriver::Input);
    settings.days_to_run = 2;

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let mut scene = ArenaScene::new(settings);
    scene.subscribe(Box::new(move |event: &DayEvent| {
        let label = match event {
            DayEvent::Started { day_index } => format!("start:{day_index}"),
            DayEvent::Ended(result) => format!("end:{}", result.day_index),
        };
        sink.borrow_mut().push(label);
    }));
    scene.load(&mut world);
    world.apply_pending();

    let input = InputSnapshot::empty();
    for _ in 0..(3 * 60) {
        if step(&mut scene, &mut world, &input) == SceneCommand::Quit {
            break;
        }
    }

    assert_eq!(
        events.borrow().as_slice(),
        ["start:1", "end:1", "start:2", "end:2"]
    );
}

#[test]
fn unload_clears_the_world() {
    let mut world = world_with(vec![arena("arena.test", &["stock.rock"])]);
    let mut scene = loaded(settings("arena.test", AgentDriver::Input), &mut world);
    assert!(world.entity_count() > 0);

    scene.unload(&mut world);
    assert_eq!(world.entity_count(), 0);
    assert!(scene.is_inert());
    assert_eq!(scene.day_phase(), None);
    assert_eq!(scene.day_results().len(), 1);
    assert_eq!(scene.stats().days_completed, 1);
}

#[test]
fn loot_survives_unload() {
    let mut world = world_with(vec![arena("arena.test", &["stock.rock"])]);
    let mut scene = loaded(settings("arena.test", AgentDriver::Input), &mut world);
    let ids = scene.interactable_ids();
    scene.apply_hit(&mut world, ids[0], 10, DamageCause::Harvest);
    let stone = scene.loot_totals().get("stone").copied();
    assert!(stone.is_some_and(|count| count >= 1));

    scene.unload(&mut world);

    assert!(scene.inventory().is_none());
    assert_eq!(scene.loot_totals().get("stone").copied(), stone);
    assert_eq!(scene.day_results()[0].loot.get("stone").copied(), stone);
}
