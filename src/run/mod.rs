pub mod orchestrator;
pub mod pacing;
pub mod run_model;
pub mod values;
