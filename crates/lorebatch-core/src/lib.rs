pub mod config;
pub mod logging;

pub mod api;
pub mod batch;
pub mod control;
pub mod failure;
pub mod orchestrator;
pub mod partial;
pub mod retry;
