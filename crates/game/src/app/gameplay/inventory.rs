use std::collections::BTreeMap;

pub(crate) trait InventorySink {
    fn add(&mut self, item_id: &str, count: u32);
}

/// Loot collected during the run, split into the current day and lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RunInventory {
    day: BTreeMap<String, u32>,
    total: BTreeMap<String, u32>,
}

impl RunInventory {
    pub(crate) fn clear_day(&mut self) {
        self.day.clear();
    }

    #[cfg(test)]
    pub(crate) fn day_count(&self, item_id: &str) -> u32 {
        self.day.get(item_id).copied().unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn total_count(&self, item_id: &str) -> u32 {
        self.total.get(item_id).copied().unwrap_or(0)
    }

    pub(crate) fn day_summary(&self) -> BTreeMap<String, u32> {
        self.day.clone()
    }

    pub(crate) fn totals(&self) -> &BTreeMap<String, u32> {
        &self.total
    }
}

impl InventorySink for RunInventory {
    fn add(&mut self, item_id: &str, count: u32) {
        if item_id.is_empty() || count == 0 {
            return;
        }
        let day = self.day.entry(item_id.to_string()).or_default();
        *day = day.saturating_add(count);
        let total = self.total.entry(item_id.to_string()).or_default();
        *total = total.saturating_add(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_tracks_day_and_total() {
        let mut inventory = RunInventory::default();
        inventory.add("stone", 2);
        inventory.add("stone", 3);
        inventory.add("wood", 1);

        assert_eq!(inventory.day_count("stone"), 5);
        assert_eq!(inventory.total_count("wood"), 1);

        inventory.clear_day();
        inventory.add("wood", 4);
        assert_eq!(inventory.day_count("stone"), 0);
        assert_eq!(inventory.total_count("stone"), 5);
        assert_eq!(
            inventory.day_summary(),
            BTreeMap::from([("wood".to_string(), 4)])
        );
        assert_eq!(inventory.totals().get("wood"), Some(&5));
    }

    #[test]
    fn empty_ids_and_zero_counts_are_ignored() {
        let mut inventory = RunInventory::default();
        inventory.add("", 3);
        inventory.add("stone", 0);
        assert!(inventory.day_summary().is_empty());
        assert!(inventory.totals().is_empty());
    }
}
