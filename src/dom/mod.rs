pub mod dom_model;
pub mod path;
pub mod snapshot;
