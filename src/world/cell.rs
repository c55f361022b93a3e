// Cell
//
// Coarse spatial bucket (chunk coordinate) used as the unit of interest
// management. An entity's relevance to a connection derives from whether its
// current cell lies inside the connection's interest region.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chebyshev distance to another cell, the metric interest regions use.
    pub fn distance(&self, other: &Cell) -> i32 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        let dz = (self.z - other.z).abs();
        dx.max(dy).max(dz)
    }
}
