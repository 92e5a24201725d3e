use std::collections::BTreeMap;

use engine::{DensityRounding, EntityId, SpawnRuleDef, Vec2};
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::placement::{find_placement, PlacementParams, PlacementQuery, SpawnArea};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RefillPolicy {
    pub(crate) floor: u32,
    pub(crate) batch: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SpawnRule {
    pub(crate) template: String,
    pub(crate) initial_burst: u32,
    /// 0 means unlimited.
    pub(crate) daily_cap: u32,
    /// 0 means unlimited.
    pub(crate) max_alive: u32,
    pub(crate) interval_seconds: f32,
    pub(crate) respawn: bool,
    pub(crate) refill: Option<RefillPolicy>,
}

impl SpawnRule {
    pub(crate) fn from_def(def: &SpawnRuleDef) -> Self {
        Self {
            template: def.template.clone(),
            initial_burst: def.initial_burst,
            daily_cap: def.daily_cap,
            max_alive: def.max_alive,
            interval_seconds: def.interval_seconds,
            respawn: def.respawn,
            refill: def.refill.map(|refill| RefillPolicy {
                floor: refill.floor,
                batch: refill.batch,
            }),
        }
    }

    fn periodic_interval(&self) -> Option<f32> {
        (self.respawn && self.interval_seconds.is_finite() && self.interval_seconds > 0.0)
            .then_some(self.interval_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DensityScale {
    pub(crate) factor: f32,
    pub(crate) rounding: DensityRounding,
    pub(crate) min: u32,
}

impl DensityScale {
    fn apply(&self, value: u32) -> u32 {
        let factor = if self.factor.is_finite() {
            self.factor.max(1.0)
        } else {
            1.0
        };
        let raw = value as f32 * factor;
        let rounded = match self.rounding {
            DensityRounding::Ceil => raw.ceil(),
            DensityRounding::Nearest => raw.round(),
        };
        (rounded as u32).max(self.min)
    }
}

/// Scaled copies of the stock rules (those with a refill policy). Hostile
/// rules pass through untouched.
pub(crate) fn scale_rules(rules: &[SpawnRule], scale: DensityScale) -> Vec<SpawnRule> {
    rules
        .iter()
        .map(|rule| {
            let Some(refill) = rule.refill else {
                return rule.clone();
            };
            SpawnRule {
                initial_burst: scale.apply(rule.initial_burst),
                refill: Some(RefillPolicy {
                    floor: scale.apply(refill.floor),
                    batch: scale.apply(refill.batch),
                }),
                ..rule.clone()
            }
        })
        .collect()
}

/// Handle given to every spawned entity; releasing it frees the alive slot of
/// the rule that spawned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct SpawnTicket {
    pub(crate) rule_index: usize,
    serial: u64,
}

/// World access the spawner needs besides placement queries.
pub(crate) trait SpawnHost: PlacementQuery {
    fn instantiate(&mut self, template: &str, position: Vec2, ticket: SpawnTicket)
        -> Option<EntityId>;
    fn despawn(&mut self, entity: EntityId);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SpawnAttempt {
    Spawned {
        entity: EntityId,
        ticket: SpawnTicket,
        attempts: u32,
    },
    AliveCapReached,
    DailyCapReached,
    NoPlacement {
        attempts: u32,
    },
    TemplateUnavailable,
    UnknownRule,
}

#[derive(Debug, Clone, Copy, Default)]
struct RuleCounters {
    spawned_today: u32,
    alive_now: u32,
    timer: Option<f32>,
    quota_rejections: u32,
    placement_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct RuleMetrics {
    pub(crate) template: String,
    pub(crate) alive: u32,
    pub(crate) spawned_today: u32,
    pub(crate) quota_rejections: u32,
    pub(crate) placement_failures: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct PopulationMetrics {
    pub(crate) rules: Vec<RuleMetrics>,
}

impl PopulationMetrics {
    pub(crate) fn total_alive(&self) -> u32 {
        self.rules.iter().map(|rule| rule.alive).sum()
    }

    pub(crate) fn total_spawned_today(&self) -> u32 {
        self.rules.iter().map(|rule| rule.spawned_today).sum()
    }
}

/// Owns the rule set, per-rule counters and the alive list. Entities are
/// created and destroyed through a [`SpawnHost`].
#[derive(Debug)]
pub(crate) struct PopulationSpawner {
    rules: Vec<SpawnRule>,
    pending_rules: Option<Vec<SpawnRule>>,
    counters: Vec<RuleCounters>,
    alive: BTreeMap<SpawnTicket, EntityId>,
    area: SpawnArea,
    params: PlacementParams,
    rng: StdRng,
    running: bool,
    next_serial: u64,
}

impl PopulationSpawner {
    pub(crate) fn new(
        rules: Vec<SpawnRule>,
        area: SpawnArea,
        params: PlacementParams,
        rng: StdRng,
    ) -> Self {
        if area.is_empty() {
            warn!(
                min_x = area.min().x,
                min_y = area.min().y,
                max_x = area.max().x,
                max_y = area.max().y,
                "spawn_area_empty"
            );
        }
        let counters = vec![RuleCounters::default(); rules.len()];
        Self {
            rules,
            pending_rules: None,
            counters,
            alive: BTreeMap::new(),
            area,
            params,
            rng,
            running: false,
            next_serial: 0,
        }
    }

    pub(crate) fn rules(&self) -> &[SpawnRule] {
        &self.rules
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    /// Replaces the rule set from the next `populate` on.
    pub(crate) fn set_rules(&mut self, rules: Vec<SpawnRule>) {
        self.pending_rules = Some(rules);
    }

    #[cfg(test)]
    pub(crate) fn alive_count(&self, rule_index: usize) -> u32 {
        self.counters
            .get(rule_index)
            .map(|counters| counters.alive_now)
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn spawned_today(&self, rule_index: usize) -> u32 {
        self.counters
            .get(rule_index)
            .map(|counters| counters.spawned_today)
            .unwrap_or(0)
    }

    pub(crate) fn total_alive(&self) -> usize {
        self.alive.len()
    }

    pub(crate) fn populate<H: SpawnHost + ?Sized>(&mut self, host: &mut H) {
        if let Some(rules) = self.pending_rules.take() {
            self.rules = rules;
        }

        // Stock (refill rules) is rebuilt every day. Other survivors keep
        // their slot while their rule still exists.
        let rule_count = self.rules.len();
        let rules = &self.rules;
        let mut cleared = Vec::new();
        self.alive.retain(|ticket, entity| {
            let keep = rules
                .get(ticket.rule_index)
                .is_some_and(|rule| rule.refill.is_none());
            if !keep {
                cleared.push(*entity);
            }
            keep
        });
        for entity in &cleared {
            host.despawn(*entity);
        }
        self.counters = vec![RuleCounters::default(); rule_count];
        for ticket in self.alive.keys() {
            self.counters[ticket.rule_index].alive_now += 1;
        }
        self.running = true;

        for rule_index in 0..rule_count {
            for _ in 0..self.rules[rule_index].initial_burst {
                self.try_spawn_one(rule_index, host);
            }
            if self.rules[rule_index].periodic_interval().is_some() {
                self.counters[rule_index].timer = Some(0.0);
            }
        }

        info!(
            rules = rule_count,
            alive = self.alive.len(),
            cleared = cleared.len(),
            "population_populated"
        );
    }

    /// Advances every armed periodic timer; one attempt per elapsed interval.
    pub(crate) fn tick<H: SpawnHost + ?Sized>(&mut self, dt: f32, host: &mut H) {
        if !self.running || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        for rule_index in 0..self.rules.len() {
            let Some(interval) = self.rules[rule_index].periodic_interval() else {
                continue;
            };
            let Some(elapsed) = self.counters[rule_index].timer.as_mut() else {
                continue;
            };
            *elapsed += dt;
            let mut due = 0u32;
            while *elapsed >= interval {
                *elapsed -= interval;
                due = due.saturating_add(1);
            }
            for _ in 0..due {
                if !self.running {
                    return;
                }
                self.try_spawn_one(rule_index, host);
            }
        }
    }

    pub(crate) fn stop<H: SpawnHost + ?Sized>(&mut self, despawn_all: bool, host: &mut H) {
        self.running = false;
        for counters in &mut self.counters {
            counters.timer = None;
        }
        let mut despawned = 0usize;
        if despawn_all {
            for (_, entity) in std::mem::take(&mut self.alive) {
                host.despawn(entity);
                despawned += 1;
            }
            for counters in &mut self.counters {
                counters.alive_now = 0;
            }
        }
        info!(despawn_all, despawned, "population_stopped");
    }

    pub(crate) fn try_spawn_one<H: SpawnHost + ?Sized>(
        &mut self,
        rule_index: usize,
        host: &mut H,
    ) -> SpawnAttempt {
        let Some(rule) = self.rules.get(rule_index) else {
            return SpawnAttempt::UnknownRule;
        };
        let counters = &mut self.counters[rule_index];

        if rule.max_alive > 0 && counters.alive_now >= rule.max_alive {
            counters.quota_rejections = counters.quota_rejections.saturating_add(1);
            return SpawnAttempt::AliveCapReached;
        }
        if rule.daily_cap > 0 && counters.spawned_today >= rule.daily_cap {
            counters.quota_rejections = counters.quota_rejections.saturating_add(1);
            return SpawnAttempt::DailyCapReached;
        }

        let placement = find_placement(&self.area, &self.params, &*host, &mut self.rng);
        let Some(position) = placement.position else {
            counters.placement_failures = counters.placement_failures.saturating_add(1);
            debug!(
                template = rule.template.as_str(),
                attempts = placement.attempts,
                "spawn_placement_exhausted"
            );
            return SpawnAttempt::NoPlacement {
                attempts: placement.attempts,
            };
        };

        let ticket = SpawnTicket {
            rule_index,
            serial: self.next_serial,
        };
        self.next_serial = self.next_serial.saturating_add(1);

        let Some(entity) = host.instantiate(&rule.template, position, ticket) else {
            warn!(template = rule.template.as_str(), "spawn_template_unavailable");
            return SpawnAttempt::TemplateUnavailable;
        };

        self.alive.insert(ticket, entity);
        counters.alive_now = counters.alive_now.saturating_add(1);
        counters.spawned_today = counters.spawned_today.saturating_add(1);
        SpawnAttempt::Spawned {
            entity,
            ticket,
            attempts: placement.attempts,
        }
    }

    /// Frees the alive slot held by `ticket`. Unknown or already released
    /// tickets are ignored.
    pub(crate) fn release(&mut self, ticket: SpawnTicket) -> bool {
        if self.alive.remove(&ticket).is_none() {
            return false;
        }
        if let Some(counters) = self.counters.get_mut(ticket.rule_index) {
            counters.alive_now = counters.alive_now.saturating_sub(1);
        }
        true
    }

    /// Tops up every refill rule below its floor, at most `batch` per call.
    pub(crate) fn refill_if_needed<H: SpawnHost + ?Sized>(&mut self, host: &mut H) -> u32 {
        if !self.running {
            return 0;
        }
        let mut spawned = 0u32;
        for rule_index in 0..self.rules.len() {
            let Some(refill) = self.rules[rule_index].refill else {
                continue;
            };
            let alive = self.counters[rule_index].alive_now;
            if alive >= refill.floor {
                continue;
            }
            let need = (refill.floor - alive).min(refill.batch.max(1));
            for _ in 0..need {
                if matches!(
                    self.try_spawn_one(rule_index, host),
                    SpawnAttempt::Spawned { .. }
                ) {
                    spawned += 1;
                }
            }
        }
        if spawned > 0 {
            debug!(spawned, "population_refilled");
        }
        spawned
    }

    pub(crate) fn metrics(&self) -> PopulationMetrics {
        PopulationMetrics {
            rules: self
                .rules
                .iter()
                .zip(&self.counters)
                .map(|(rule, counters)| RuleMetrics {
                    template: rule.template.clone(),
                    alive: counters.alive_now,
                    spawned_today: counters.spawned_today,
                    quota_rejections: counters.quota_rejections,
                    placement_failures: counters.placement_failures,
                })
                .collect(),
        }
    }
}
