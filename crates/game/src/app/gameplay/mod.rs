mod arena;
mod combat;
mod damage;
mod day_cycle;
mod dwell;
mod harvest;
mod hostile;
mod inventory;
mod placement;
mod spawner;

pub(crate) use arena::{AgentDriver, ArenaScene, ArenaSettings};
pub(crate) use combat::CombatTuning;
#[cfg(test)]
pub(crate) use damage::DamageCause;
pub(crate) use day_cycle::DayEvent;
pub(crate) use dwell::DwellTuning;
pub(crate) use harvest::HarvestTuning;

#[cfg(test)]
mod tests;
