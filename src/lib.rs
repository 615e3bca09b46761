pub mod config;
pub mod messages;
pub mod runtime;
pub mod thruster;
