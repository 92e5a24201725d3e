use std::collections::HashMap;

use crate::app::Vec2;

#[derive(Debug, Clone, PartialEq)]
pub struct YieldEntryDef {
    pub item_id: String,
    pub min: u32,
    pub max: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractableDef {
    pub def_name: String,
    pub label: String,
    pub max_hp: u32,
    pub radius: f32,
    pub yield_rolls: u32,
    pub yields: Vec<YieldEntryDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostileDef {
    pub def_name: String,
    pub label: String,
    pub max_hp: u32,
    pub radius: f32,
    pub sight_radius: f32,
    pub move_speed: f32,
    pub stop_distance: f32,
    pub attack_range: f32,
    pub attack_cooldown_seconds: f32,
    pub damage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefillDef {
    pub floor: u32,
    pub batch: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRuleDef {
    pub def_name: String,
    pub template: String,
    pub initial_burst: u32,
    pub daily_cap: u32,
    pub max_alive: u32,
    pub interval_seconds: f32,
    pub respawn: bool,
    pub refill: Option<RefillDef>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleDef {
    pub center: Vec2,
    pub half_extents: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityRounding {
    Ceil,
    Nearest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArenaDef {
    pub def_name: String,
    pub label: String,
    pub area_min: Vec2,
    pub area_max: Vec2,
    pub agent_start: Vec2,
    pub agent_move_speed: f32,
    pub spawn_rules: Vec<String>,
    pub obstacles: Vec<ObstacleDef>,
    pub max_placement_tries: u32,
    pub min_distance_from_agent: f32,
    pub footprint_radius: f32,
    pub seconds_per_day: f32,
    pub despawn_on_day_end: bool,
    pub density_factor: f32,
    pub density_rounding: DensityRounding,
    pub density_min: u32,
}

/// One named collection per def type; lookups by def name are exact.
#[derive(Debug, Clone, PartialEq)]
struct DefTable<T> {
    defs: Vec<T>,
    index_by_name: HashMap<String, usize>,
}

impl<T> Default for DefTable<T> {
    fn default() -> Self {
        Self {
            defs: Vec::new(),
            index_by_name: HashMap::new(),
        }
    }
}

impl<T> DefTable<T> {
    fn from_named(defs: Vec<(String, T)>) -> Self {
        let mut index_by_name = HashMap::with_capacity(defs.len());
        let mut ordered = Vec::with_capacity(defs.len());
        for (idx, (name, def)) in defs.into_iter().enumerate() {
            index_by_name.insert(name, idx);
            ordered.push(def);
        }
        Self {
            defs: ordered,
            index_by_name,
        }
    }

    fn get(&self, name: &str) -> Option<&T> {
        self.index_by_name
            .get(name)
            .and_then(|idx| self.defs.get(*idx))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DefDatabase {
    interactables: DefTable<InteractableDef>,
    hostiles: DefTable<HostileDef>,
    spawn_rules: DefTable<SpawnRuleDef>,
    arenas: DefTable<ArenaDef>,
}

impl DefDatabase {
    pub fn builder() -> DefDatabaseBuilder {
        DefDatabaseBuilder::default()
    }

    pub fn interactable(&self, def_name: &str) -> Option<&InteractableDef> {
        self.interactables.get(def_name)
    }

    pub fn hostile(&self, def_name: &str) -> Option<&HostileDef> {
        self.hostiles.get(def_name)
    }

    pub fn spawn_rule(&self, def_name: &str) -> Option<&SpawnRuleDef> {
        self.spawn_rules.get(def_name)
    }

    pub fn arena(&self, def_name: &str) -> Option<&ArenaDef> {
        self.arenas.get(def_name)
    }

    pub fn interactables(&self) -> &[InteractableDef] {
        &self.interactables.defs
    }

    pub fn hostiles(&self) -> &[HostileDef] {
        &self.hostiles.defs
    }

    pub fn spawn_rules(&self) -> &[SpawnRuleDef] {
        &self.spawn_rules.defs
    }

    pub fn arenas(&self) -> &[ArenaDef] {
        &self.arenas.defs
    }

    pub fn def_count(&self) -> usize {
        self.interactables.defs.len()
            + self.hostiles.defs.len()
            + self.spawn_rules.defs.len()
            + self.arenas.defs.len()
    }
}

/// Collects defs in any order; `build` orders every table by def name so the
/// database layout does not depend on file or mod order.
#[derive(Debug, Default)]
pub struct DefDatabaseBuilder {
    interactables: Vec<InteractableDef>,
    hostiles: Vec<HostileDef>,
    spawn_rules: Vec<SpawnRuleDef>,
    arenas: Vec<ArenaDef>,
}

impl DefDatabaseBuilder {
    pub fn interactable(mut self, def: InteractableDef) -> Self {
        self.interactables.push(def);
        self
    }

    pub fn hostile(mut self, def: HostileDef) -> Self {
        self.hostiles.push(def);
        self
    }

    pub fn spawn_rule(mut self, def: SpawnRuleDef) -> Self {
        self.spawn_rules.push(def);
        self
    }

    pub fn arena(mut self, def: ArenaDef) -> Self {
        self.arenas.push(def);
        self
    }

    pub fn build(self) -> DefDatabase {
        DefDatabase {
            interactables: table_by_name(self.interactables, |def| &def.def_name),
            hostiles: table_by_name(self.hostiles, |def| &def.def_name),
            spawn_rules: table_by_name(self.spawn_rules, |def| &def.def_name),
            arenas: table_by_name(self.arenas, |def| &def.def_name),
        }
    }
}

fn table_by_name<T>(defs: Vec<T>, name_of: impl Fn(&T) -> &String) -> DefTable<T> {
    // Later entries with the same name replace earlier ones.
    let mut by_name = std::collections::BTreeMap::<String, T>::new();
    for def in defs {
        by_name.insert(name_of(&def).clone(), def);
    }
    DefTable::from_named(by_name.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, template: &str) -> SpawnRuleDef {
        SpawnRuleDef {
            def_name: name.to_string(),
            template: template.to_string(),
            initial_burst: 1,
            daily_cap: 0,
            max_alive: 0,
            interval_seconds: 0.0,
            respawn: false,
            refill: None,
        }
    }

    #[test]
    fn tables_are_ordered_by_def_name() {
        let db = DefDatabase::builder()
            .spawn_rule(rule("zeta", "t"))
            .spawn_rule(rule("alpha", "t"))
            .build();
        let names = db
            .spawn_rules()
            .iter()
            .map(|def| def.def_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert!(db.spawn_rule("zeta").is_some());
    }

    #[test]
    fn later_def_with_same_name_wins() {
        let db = DefDatabase::builder()
            .spawn_rule(rule("stock", "first"))
            .spawn_rule(rule("stock", "second"))
            .build();
        assert_eq!(db.spawn_rules().len(), 1);
        assert_eq!(
            db.spawn_rule("stock").map(|def| def.template.as_str()),
            Some("second")
        );
    }
}
