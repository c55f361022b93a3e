use std::collections::HashSet;

use crate::world::cell::Cell;

/// Cube of cells within `radius` (Chebyshev) of an anchor cell: the portion
/// of the world one connection is currently interested in.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct InterestRegion {
    center: Cell,
    radius: i32,
}

impl InterestRegion {
    pub fn new(center: Cell, radius: i32) -> Self {
        Self {
            center,
            radius: radius.max(0),
        }
    }

    pub fn center(&self) -> Cell {
        self.center
    }

    pub fn contains(&self, cell: &Cell) -> bool {
        self.center.distance(cell) <= self.radius
    }

    pub fn cells(&self) -> HashSet<Cell> {
        let mut cells = HashSet::new();
        for x in (self.center.x - self.radius)..=(self.center.x + self.radius) {
            for y in (self.center.y - self.radius)..=(self.center.y + self.radius) {
                for z in (self.center.z - self.radius)..=(self.center.z + self.radius) {
                    cells.insert(Cell::new(x, y, z));
                }
            }
        }
        cells
    }
}

/// Edge-triggered cell transitions for one connection, one tick. A cell
/// appears in at most one of the two sets.
#[derive(Default, Debug)]
pub struct CellTransitions {
    pub entered: HashSet<Cell>,
    pub left: HashSet<Cell>,
}

impl CellTransitions {
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.left.is_empty()
    }
}
