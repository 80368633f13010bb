/// Largest supported antialiasing factor. Probe offsets live in a fixed array of this size.
pub const MAX_ANTIALIAS: usize = 50;
/// Offset of a probe centre within its antialiasing sub-cell, in sub-cell widths.
pub const PROBE_CENTRE_OFFSET: f64 = 0.5;
/// Initial capacity of the per-cell probe tally. A cell rarely straddles more bins than this.
pub const CELL_TALLY_CAPACITY: usize = 16;
