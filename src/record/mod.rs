pub mod recorder;
pub mod step_model;
