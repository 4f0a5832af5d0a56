//! Engine services: each public function is one atomic command against the
//! world, executed under the world lock.

pub mod combat;
pub mod players;
pub mod problems;
pub mod raids;
pub mod rewards;
pub mod sessions;
pub mod sweep;
