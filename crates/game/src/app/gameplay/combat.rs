use engine::{EntityId, Vec2};
use serde::Deserialize;

use super::damage::DamageCause;
use super::dwell::ActionTicker;
use super::harvest::AgentMode;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CombatTuning {
    pub(crate) weapon_range: f32,
    pub(crate) shots_per_second: f32,
    pub(crate) damage: u32,
    pub(crate) cause: DamageCause,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            weapon_range: 3.0,
            shots_per_second: 2.0,
            damage: 1,
            cause: DamageCause::Projectile,
        }
    }
}

/// A shot the weapon wants to land this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Shot {
    pub(crate) target: EntityId,
    pub(crate) damage: u32,
    pub(crate) cause: DamageCause,
}

/// The agent's weapon. Fires at the nearest hostile in range while the agent
/// is in `Combat` mode.
#[derive(Debug, Clone)]
pub(crate) struct Weapon {
    tuning: CombatTuning,
    ticker: ActionTicker,
}

impl Weapon {
    pub(crate) fn new(tuning: CombatTuning) -> Self {
        Self {
            tuning,
            ticker: ActionTicker::default(),
        }
    }

    pub(crate) fn nearest_in_range(
        &self,
        agent: Vec2,
        hostiles: impl IntoIterator<Item = (EntityId, Vec2)>,
    ) -> Option<EntityId> {
        let range = self.tuning.weapon_range;
        if !range.is_finite() || range <= 0.0 {
            return None;
        }
        let range_sq = range * range;
        hostiles
            .into_iter()
            .map(|(id, position)| (id, position.distance_squared(agent)))
            .filter(|(_, distance_sq)| *distance_sq <= range_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    pub(crate) fn tick(
        &mut self,
        dt: f32,
        mode: AgentMode,
        target: Option<EntityId>,
    ) -> Option<Shot> {
        let Some(target) = target.filter(|_| mode == AgentMode::Combat) else {
            self.ticker.reset();
            return None;
        };
        if !self.ticker.advance(dt, self.tuning.shots_per_second) {
            return None;
        }
        Some(Shot {
            target,
            damage: self.tuning.damage.max(1),
            cause: self.tuning.cause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_nearest_hostile_inside_range() {
        let weapon = Weapon::new(CombatTuning::default());
        let hostiles = [
            (EntityId(1), Vec2::new(2.5, 0.0)),
            (EntityId(2), Vec2::new(0.0, 1.5)),
            (EntityId(3), Vec2::new(0.5, 9.0)),
        ];
        assert_eq!(
            weapon.nearest_in_range(Vec2::ZERO, hostiles),
            Some(EntityId(2))
        );
        assert_eq!(
            weapon.nearest_in_range(Vec2::new(50.0, 50.0), hostiles),
            None
        );
    }

    #[test]
    fn holds_fire_outside_combat_mode() {
        let mut weapon = Weapon::new(CombatTuning::default());
        for _ in 0..100 {
            assert_eq!(weapon.tick(0.02, AgentMode::Harvest, Some(EntityId(1))), None);
        }
    }

    #[test]
    fn fires_at_configured_rate_with_configured_cause() {
        let mut weapon = Weapon::new(CombatTuning {
            cause: DamageCause::Explosion,
            damage: 0,
            ..CombatTuning::default()
        });
        let shots: Vec<Shot> = (0..100)
            .filter_map(|_| weapon.tick(0.02, AgentMode::Combat, Some(EntityId(4))))
            .collect();

        assert!((3..=4).contains(&shots.len()), "shots = {}", shots.len());
        assert!(shots.iter().all(|shot| shot.target == EntityId(4)
            && shot.damage == 1
            && shot.cause == DamageCause::Explosion));
    }

    #[test]
    fn losing_the_target_resets_the_pulse() {
        let mut weapon = Weapon::new(CombatTuning::default());
        for _ in 0..20 {
            assert_eq!(weapon.tick(0.02, AgentMode::Combat, Some(EntityId(1))), None);
        }
        assert_eq!(weapon.tick(0.02, AgentMode::Combat, None), None);
        for _ in 0..20 {
            assert_eq!(weapon.tick(0.02, AgentMode::Combat, Some(EntityId(1))), None);
        }
    }
}
