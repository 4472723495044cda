//! Lattice data: planes, the Grid State that owns the complex field, and
//! initial-condition builders (wave packets, preset potentials).

mod packet;
mod plane;
mod state;

pub use packet::{PotentialField, WavePacket};
pub use plane::Plane;
pub use state::{Component, GridState, SweepBuffers, SweepInputs};
