//! CLI subcommand implementations for the topup-agent binary.

pub mod doctor;
pub mod health;
pub mod once;
pub mod run;
