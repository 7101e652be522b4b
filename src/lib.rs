pub mod autonomous;
pub mod config;
pub mod messages;
pub mod motor;
pub mod robot;
pub mod runtime;
