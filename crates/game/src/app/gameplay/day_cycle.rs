use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use super::harvest::Harvester;
use super::inventory::RunInventory;
use super::spawner::{PopulationMetrics, PopulationSpawner, SpawnHost};

const MIN_SECONDS_PER_DAY: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DayPhase {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeferredOp {
    Refill,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct DayResult {
    pub(crate) day_index: u32,
    pub(crate) loot: BTreeMap<String, u32>,
    pub(crate) day_length_seconds: f32,
    pub(crate) population: PopulationMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DayEvent {
    Started { day_index: u32 },
    Ended(DayResult),
}

pub(crate) type DayListener = Box<dyn FnMut(&DayEvent)>;

/// Collaborators the day cycle drives. Borrowed per call; the cycle owns none
/// of them.
pub(crate) struct DayContext<'a, H: SpawnHost + ?Sized> {
    pub(crate) spawner: &'a mut PopulationSpawner,
    pub(crate) harvester: &'a mut Harvester,
    pub(crate) inventory: &'a mut RunInventory,
    pub(crate) host: &'a mut H,
}

pub(crate) struct DayCycle {
    phase: DayPhase,
    day_index: u32,
    tick_index: u64,
    elapsed_seconds: f32,
    despawn_on_day_end: bool,
    deferred: Vec<(u64, DeferredOp)>,
    listeners: Vec<DayListener>,
}

impl DayCycle {
    pub(crate) fn new(despawn_on_day_end: bool) -> Self {
        Self {
            phase: DayPhase::Idle,
            day_index: 0,
            tick_index: 0,
            elapsed_seconds: 0.0,
            despawn_on_day_end,
            deferred: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub(crate) fn phase(&self) -> DayPhase {
        self.phase
    }

    pub(crate) fn day_index(&self) -> u32 {
        self.day_index
    }

    #[cfg(test)]
    pub(crate) fn pending_ops(&self) -> usize {
        self.deferred.len()
    }

    pub(crate) fn subscribe(&mut self, listener: DayListener) {
        self.listeners.push(listener);
    }

    pub(crate) fn start_day<H: SpawnHost + ?Sized>(&mut self, ctx: DayContext<'_, H>) -> bool {
        if self.phase == DayPhase::Running {
            return false;
        }
        self.phase = DayPhase::Running;
        self.elapsed_seconds = 0.0;

        ctx.spawner.populate(&mut *ctx.host);
        ctx.harvester.set_enabled(true);
        ctx.inventory.clear_day();
        self.day_index = self.day_index.saturating_add(1);

        info!(
            day = self.day_index,
            alive = ctx.spawner.total_alive(),
            "day_started"
        );
        self.notify(&DayEvent::Started {
            day_index: self.day_index,
        });
        true
    }

    pub(crate) fn end_day<H: SpawnHost + ?Sized>(
        &mut self,
        ctx: DayContext<'_, H>,
    ) -> Option<DayResult> {
        if self.phase == DayPhase::Idle {
            return None;
        }
        self.phase = DayPhase::Idle;

        let population = ctx.spawner.metrics();
        ctx.spawner.stop(self.despawn_on_day_end, &mut *ctx.host);
        ctx.harvester.set_enabled(false);
        let dropped = self.deferred.len();
        self.deferred.clear();

        let result = DayResult {
            day_index: self.day_index,
            loot: ctx.inventory.day_summary(),
            day_length_seconds: self.elapsed_seconds,
            population,
        };
        info!(
            day = result.day_index,
            day_length_seconds = result.day_length_seconds,
            loot_kinds = result.loot.len(),
            dropped_ops = dropped,
            "day_ended"
        );
        self.notify(&DayEvent::Ended(result.clone()));
        Some(result)
    }

    /// Schedules a refill for the tick after the current one.
    pub(crate) fn notify_removed(&mut self) {
        if self.phase != DayPhase::Running {
            return;
        }
        let due = self.tick_index.saturating_add(1);
        self.deferred.push((due, DeferredOp::Refill));
        debug!(due_tick = due, "refill_scheduled");
    }

    pub(crate) fn tick<H: SpawnHost + ?Sized>(&mut self, dt: f32, ctx: DayContext<'_, H>) {
        self.tick_index = self.tick_index.saturating_add(1);
        if self.phase != DayPhase::Running {
            return;
        }
        self.elapsed_seconds += dt.max(0.0);

        let now = self.tick_index;
        let mut due = Vec::new();
        self.deferred.retain(|(tick, op)| {
            if *tick <= now {
                due.push(*op);
                false
            } else {
                true
            }
        });
        for op in due {
            match op {
                DeferredOp::Refill => {
                    ctx.spawner.refill_if_needed(&mut *ctx.host);
                }
            }
        }

        ctx.spawner.tick(dt, &mut *ctx.host);
    }

    fn notify(&mut self, event: &DayEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }
}

/// Countdown for one in-game day. Reports expiry once per day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DayTimer {
    seconds_per_day: f32,
    time_left: f32,
    running: bool,
    day_number: u32,
}

impl DayTimer {
    pub(crate) fn new(seconds_per_day: f32) -> Self {
        let seconds_per_day = if seconds_per_day.is_finite() {
            seconds_per_day.max(MIN_SECONDS_PER_DAY)
        } else {
            MIN_SECONDS_PER_DAY
        };
        Self {
            seconds_per_day,
            time_left: 0.0,
            running: false,
            day_number: 1,
        }
    }

    pub(crate) fn seconds_per_day(&self) -> f32 {
        self.seconds_per_day
    }

    pub(crate) fn time_left(&self) -> f32 {
        self.time_left
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn day_number(&self) -> u32 {
        self.day_number
    }

    pub(crate) fn start(&mut self) {
        self.running = true;
        self.time_left = self.seconds_per_day;
    }

    pub(crate) fn stop(&mut self) {
        self.running = false;
        self.time_left = 0.0;
    }

    pub(crate) fn next_day(&mut self) {
        self.day_number = self.day_number.saturating_add(1);
        self.start();
    }

    /// Returns true on the tick the countdown reaches zero.
    pub(crate) fn tick(&mut self, dt: f32) -> bool {
        if !self.running {
            return false;
        }
        self.time_left = (self.time_left - dt.max(0.0)).max(0.0);
        if self.time_left <= 0.0 {
            self.running = false;
            return true;
        }
        false
    }
}
