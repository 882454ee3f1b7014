mod fast_map;
mod frozen;

pub use fast_map::*;
pub use frozen::FrozenTable;
