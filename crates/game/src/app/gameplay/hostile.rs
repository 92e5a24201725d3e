use engine::{HostileDef, Vec2};

const ATTACK_RANGE_SLACK: f32 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostileState {
    Idle,
    Chase,
    Attack,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HostileProfile {
    pub(crate) sight_radius: f32,
    pub(crate) move_speed: f32,
    pub(crate) stop_distance: f32,
    pub(crate) attack_range: f32,
    pub(crate) attack_cooldown_seconds: f32,
    pub(crate) damage: u32,
}

impl HostileProfile {
    pub(crate) fn from_def(def: &HostileDef) -> Self {
        Self {
            sight_radius: def.sight_radius,
            move_speed: def.move_speed,
            stop_distance: def.stop_distance,
            attack_range: def.attack_range,
            attack_cooldown_seconds: def.attack_cooldown_seconds,
            damage: def.damage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HostileStep {
    pub(crate) position: Vec2,
    /// Damage dealt to the agent this tick, if an attack landed.
    pub(crate) attack: Option<u32>,
}

#[derive(Debug, Clone)]
pub(crate) struct HostileBrain {
    profile: HostileProfile,
    state: HostileState,
    cooldown: f32,
}

impl HostileBrain {
    pub(crate) fn new(profile: HostileProfile) -> Self {
        Self {
            profile,
            state: HostileState::Idle,
            cooldown: 0.0,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> HostileState {
        self.state
    }

    pub(crate) fn update(&mut self, dt: f32, position: Vec2, agent: Option<Vec2>) -> HostileStep {
        if self.cooldown > 0.0 {
            self.cooldown -= dt;
        }

        let distance = agent.map(|agent| agent.distance(position));
        let sees = distance.is_some_and(|distance| distance <= self.profile.sight_radius);

        self.state = match (self.state, distance) {
            (_, None) => HostileState::Idle,
            (HostileState::Idle, Some(_)) if sees => HostileState::Chase,
            (HostileState::Idle, Some(_)) => HostileState::Idle,
            (HostileState::Chase, Some(distance)) if distance <= self.profile.attack_range => {
                HostileState::Attack
            }
            (HostileState::Chase, Some(_)) if !sees => HostileState::Idle,
            (HostileState::Chase, Some(_)) => HostileState::Chase,
            (HostileState::Attack, Some(distance)) if distance > self.profile.attack_range => {
                HostileState::Chase
            }
            (HostileState::Attack, Some(_)) => HostileState::Attack,
        };

        let mut step = HostileStep {
            position,
            attack: None,
        };
        let (Some(agent), Some(distance)) = (agent, distance) else {
            return step;
        };

        match self.state {
            HostileState::Idle => {}
            HostileState::Chase => {
                if distance > self.profile.stop_distance {
                    let travel = (self.profile.move_speed.max(0.0) * dt)
                        .min(distance - self.profile.stop_distance);
                    step.position = position + (agent - position).normalized_or_zero() * travel;
                }
            }
            HostileState::Attack => {
                if self.cooldown <= 0.0
                    && distance <= self.profile.attack_range + ATTACK_RANGE_SLACK
                {
                    step.attack = Some(self.profile.damage.max(1));
                    self.cooldown = self.profile.attack_cooldown_seconds;
                }
            }
        }
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> HostileProfile {
        HostileProfile {
            sight_radius: 8.0,
            move_speed: 2.0,
            stop_distance: 0.75,
            attack_range: 1.0,
            attack_cooldown_seconds: 1.2,
            damage: 1,
        }
    }

    #[test]
    fn chases_agent_in_sight_then_attacks_on_cooldown() {
        let mut brain = HostileBrain::new(profile());
        let agent = Vec2::new(0.0, 0.0);
        let mut position = Vec2::new(5.0, 0.0);
        let mut hits = 0;

        for _ in 0..(6 * 60) {
            let step = brain.update(1.0 / 60.0, position, Some(agent));
            position = step.position;
            hits += step.attack.map_or(0, |_| 1);
        }

        assert_eq!(brain.state(), HostileState::Attack);
        assert!(position.distance(agent) >= 0.75 - 1e-4);
        // Reaches range after a bit over two seconds, then one hit per 1.2 s.
        assert!((3..=4).contains(&hits), "hits = {hits}");
    }

    #[test]
    fn stays_idle_when_agent_is_out_of_sight() {
        let mut brain = HostileBrain::new(profile());
        let position = Vec2::new(20.0, 0.0);
        let step = brain.update(0.1, position, Some(Vec2::ZERO));
        assert_eq!(brain.state(), HostileState::Idle);
        assert_eq!(step.position, position);
    }

    #[test]
    fn losing_sight_while_chasing_returns_to_idle() {
        let mut brain = HostileBrain::new(profile());
        brain.update(0.1, Vec2::new(5.0, 0.0), Some(Vec2::ZERO));
        assert_eq!(brain.state(), HostileState::Chase);

        brain.update(0.1, Vec2::new(5.0, 0.0), Some(Vec2::new(20.0, 0.0)));
        assert_eq!(brain.state(), HostileState::Idle);
    }

    #[test]
    fn agent_leaving_attack_range_resumes_chase() {
        let mut brain = HostileBrain::new(profile());
        let position = Vec2::new(0.9, 0.0);
        brain.update(0.1, position, Some(Vec2::ZERO));
        brain.update(0.1, position, Some(Vec2::ZERO));
        assert_eq!(brain.state(), HostileState::Attack);

        brain.update(0.1, position, Some(Vec2::new(-3.0, 0.0)));
        assert_eq!(brain.state(), HostileState::Chase);
    }
}
