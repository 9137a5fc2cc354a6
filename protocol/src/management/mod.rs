pub mod instance;
pub mod player;
pub mod schedule;
