pub mod similarity;
pub mod strategy;
