//! CLI command implementations

pub mod new;
pub mod once;
pub mod run;
