/// Tuning knobs for the network system, set once at construction.
#[derive(Clone, Debug)]
pub struct SystemConfig {
    /// Interest radius in cells around a connection's anchor. Cells within
    /// this Chebyshev distance are inside the connection's region.
    pub view_distance: i32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self { view_distance: 4 }
    }
}
