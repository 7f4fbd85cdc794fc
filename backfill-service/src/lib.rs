pub mod backfill;
pub mod chunk;
pub mod config;
pub mod generate;
pub mod observability;
pub mod retry;
pub mod run;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use backfill::{BackfillApi, BackfillError};
pub use config::{Cli, JobConfig, Settings};
pub use run::{dry_run, run, RunReport};
