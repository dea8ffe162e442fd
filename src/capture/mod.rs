pub mod context;
pub mod generator;
pub mod label;
