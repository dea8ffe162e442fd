pub mod bundle;
pub mod capture;
pub mod cli;
pub mod dom;
pub mod error;
pub mod execute;
pub mod locate;
pub mod page;
pub mod persist;
pub mod record;
pub mod report;
pub mod run;
pub mod trace;
