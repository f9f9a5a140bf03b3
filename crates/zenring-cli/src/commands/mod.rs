pub mod config;
pub mod drag;
pub mod run;
pub mod sounds;
