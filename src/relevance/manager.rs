use std::collections::{HashMap, HashSet};

use crate::connection::key::ConnectionKey;
use crate::world::cell::Cell;

use super::region::{CellTransitions, InterestRegion};

#[derive(Default)]
struct RegionRecord {
    region: Option<InterestRegion>,
    cells: HashSet<Cell>,
}

/// Per-connection spatial interest tracker.
///
/// Each tick the region is recomputed from the connection's anchor position
/// and diffed against the previous tick's cell set, so every cell enters or
/// leaves a connection's interest at most once per tick.
pub struct RelevanceManager {
    records: HashMap<ConnectionKey, RegionRecord>,
}

impl RelevanceManager {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    pub fn add_connection(&mut self, key: ConnectionKey) {
        self.records.entry(key).or_default();
    }

    pub fn remove_connection(&mut self, key: &ConnectionKey) {
        self.records.remove(key);
    }

    /// Recomputes the connection's region around `anchor` and returns the
    /// cell transitions since last tick. `anchor` is None while the
    /// connection has no positioned avatar; the region is then empty and
    /// every previously-held cell is reported as left.
    pub fn tick(
        &mut self,
        key: &ConnectionKey,
        anchor: Option<Cell>,
        view_distance: i32,
    ) -> CellTransitions {
        let Some(record) = self.records.get_mut(key) else {
            return CellTransitions::default();
        };

        let region = anchor.map(|center| InterestRegion::new(center, view_distance));

        // Unchanged region, no transitions to compute.
        if region == record.region {
            return CellTransitions::default();
        }

        let next_cells = region
            .as_ref()
            .map(|r| r.cells())
            .unwrap_or_default();

        let entered = next_cells.difference(&record.cells).copied().collect();
        let left = record.cells.difference(&next_cells).copied().collect();

        record.region = region;
        record.cells = next_cells;

        CellTransitions { entered, left }
    }

    /// Whether the cell is inside the connection's current interest region.
    pub fn contains(&self, key: &ConnectionKey, cell: &Cell) -> bool {
        self.records
            .get(key)
            .is_some_and(|record| record.cells.contains(cell))
    }

    pub fn current_cells(&self, key: &ConnectionKey) -> Option<&HashSet<Cell>> {
        self.records.get(key).map(|record| &record.cells)
    }
}

impl Default for RelevanceManager {
    fn default() -> Self {
        Self::new()
    }
}
