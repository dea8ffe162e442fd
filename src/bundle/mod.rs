pub mod bundle_model;
