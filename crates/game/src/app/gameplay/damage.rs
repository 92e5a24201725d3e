use engine::InteractableDef;
use rand::Rng;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum DamageCause {
    Generic,
    Projectile,
    Harvest,
    Explosion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HitOutcome {
    Ignored,
    Damaged { remaining: u32 },
    Destroyed { harvested: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Health {
    current: u32,
    max: u32,
    last_cause: Option<DamageCause>,
}

impl Health {
    pub(crate) fn new(max: u32) -> Self {
        let max = max.max(1);
        Self {
            current: max,
            max,
            last_cause: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> u32 {
        self.current
    }

    pub(crate) fn max(&self) -> u32 {
        self.max
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.current == 0
    }

    pub(crate) fn last_cause(&self) -> Option<DamageCause> {
        self.last_cause
    }

    /// Dead targets ignore further hits, so a kill is reported exactly once.
    pub(crate) fn apply_damage(&mut self, amount: u32, cause: DamageCause) -> HitOutcome {
        if self.is_dead() || amount == 0 {
            return HitOutcome::Ignored;
        }
        self.current = self.current.saturating_sub(amount);
        self.last_cause = Some(cause);
        if self.current == 0 {
            HitOutcome::Destroyed {
                harvested: cause == DamageCause::Harvest,
            }
        } else {
            HitOutcome::Damaged {
                remaining: self.current,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct YieldEntry {
    pub(crate) item_id: String,
    pub(crate) min: u32,
    pub(crate) max: u32,
    pub(crate) weight: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct YieldDrop {
    pub(crate) item_id: String,
    pub(crate) count: u32,
}

/// Weighted loot for one interactable. A table with no entries drops a
/// single unit of the interactable's own id.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct YieldTable {
    fallback_item: String,
    rolls: u32,
    entries: Vec<YieldEntry>,
}

impl YieldTable {
    pub(crate) fn new(fallback_item: impl Into<String>, rolls: u32, entries: Vec<YieldEntry>) -> Self {
        Self {
            fallback_item: fallback_item.into(),
            rolls,
            entries,
        }
    }

    pub(crate) fn from_def(def: &InteractableDef) -> Self {
        Self::new(
            def.def_name.clone(),
            def.yield_rolls,
            def.yields
                .iter()
                .map(|entry| YieldEntry {
                    item_id: entry.item_id.clone(),
                    min: entry.min,
                    max: entry.max,
                    weight: entry.weight,
                })
                .collect(),
        )
    }

    pub(crate) fn roll(&self, rng: &mut impl Rng) -> Vec<YieldDrop> {
        if self.entries.is_empty() {
            return vec![YieldDrop {
                item_id: self.fallback_item.clone(),
                count: 1,
            }];
        }

        let total_weight: f32 = self.entries.iter().map(entry_weight).sum();
        if total_weight <= 0.0 {
            return Vec::new();
        }

        let mut drops = Vec::new();
        for _ in 0..self.rolls {
            let pick = rng.random::<f32>() * total_weight;
            let Some(entry) = self.pick(pick) else {
                continue;
            };
            let count = if entry.min >= entry.max {
                entry.min
            } else {
                rng.random_range(entry.min..=entry.max)
            };
            if count > 0 {
                drops.push(YieldDrop {
                    item_id: entry.item_id.clone(),
                    count,
                });
            }
        }
        drops
    }

    fn pick(&self, pick: f32) -> Option<&YieldEntry> {
        let mut cumulative = 0.0;
        let mut last_weighted = None;
        for entry in &self.entries {
            let weight = entry_weight(entry);
            if weight <= 0.0 {
                continue;
            }
            cumulative += weight;
            last_weighted = Some(entry);
            if pick <= cumulative {
                return Some(entry);
            }
        }
        // Rounding can leave `pick` a hair above the summed weights.
        last_weighted
    }
}

fn entry_weight(entry: &YieldEntry) -> f32 {
    if entry.weight.is_finite() {
        entry.weight.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn entry(item_id: &str, min: u32, max: u32, weight: f32) -> YieldEntry {
        YieldEntry {
            item_id: item_id.to_string(),
            min,
            max,
            weight,
        }
    }

    #[test]
    fn three_harvest_hits_destroy_with_harvest_flag() {
        let mut health = Health::new(3);
        assert_eq!(
            health.apply_damage(1, DamageCause::Harvest),
            HitOutcome::Damaged { remaining: 2 }
        );
        assert_eq!(
            health.apply_damage(1, DamageCause::Harvest),
            HitOutcome::Damaged { remaining: 1 }
        );
        assert_eq!(
            health.apply_damage(1, DamageCause::Harvest),
            HitOutcome::Destroyed { harvested: true }
        );
        assert_eq!(
            health.apply_damage(1, DamageCause::Harvest),
            HitOutcome::Ignored
        );
    }

    #[test]
    fn overkill_from_other_causes_is_not_harvested() {
        let mut health = Health::new(3);
        assert_eq!(
            health.apply_damage(10, DamageCause::Explosion),
            HitOutcome::Destroyed { harvested: false }
        );
        assert_eq!(health.current(), 0);
        assert_eq!(health.last_cause(), Some(DamageCause::Explosion));
    }

    #[test]
    fn zero_damage_is_ignored() {
        let mut health = Health::new(2);
        assert_eq!(health.apply_damage(0, DamageCause::Generic), HitOutcome::Ignored);
        assert_eq!(health.current(), 2);
        assert_eq!(health.last_cause(), None);
    }

    #[test]
    fn empty_table_drops_own_id() {
        let table = YieldTable::new("node.rock", 3, Vec::new());
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            table.roll(&mut rng),
            vec![YieldDrop {
                item_id: "node.rock".to_string(),
                count: 1
            }]
        );
    }

    #[test]
    fn rolls_respect_ranges_and_weights() {
        let table = YieldTable::new(
            "node.rock",
            2,
            vec![
                entry("stone", 1, 3, 3.0),
                entry("flint", 2, 2, 1.0),
                entry("never", 5, 9, 0.0),
            ],
        );
        let mut rng = StdRng::seed_from_u64(42);
        let mut picks = BTreeMap::<String, u32>::new();

        for _ in 0..2000 {
            let drops = table.roll(&mut rng);
            assert_eq!(drops.len(), 2);
            for drop in drops {
                match drop.item_id.as_str() {
                    "stone" => assert!((1..=3).contains(&drop.count)),
                    "flint" => assert_eq!(drop.count, 2),
                    other => panic!("unexpected drop {other}"),
                }
                *picks.entry(drop.item_id).or_default() += 1;
            }
        }

        let stone = picks.get("stone").copied().unwrap_or_default() as f32;
        let flint = picks.get("flint").copied().unwrap_or_default() as f32;
        let ratio = stone / flint;
        assert!((2.5..3.5).contains(&ratio), "ratio = {ratio}");
    }

    #[test]
    fn zero_counts_are_dropped() {
        let table = YieldTable::new("node.bush", 4, vec![entry("berry", 0, 0, 1.0)]);
        let mut rng = StdRng::seed_from_u64(7);
        assert!(table.roll(&mut rng).is_empty());
    }
}
