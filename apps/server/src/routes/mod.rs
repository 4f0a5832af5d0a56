pub mod auth;
pub mod events;
pub mod play;
pub mod players;
pub mod raids;
pub mod session;
pub mod worker;
