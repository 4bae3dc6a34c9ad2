//! One `execute_*` entry point per subcommand
//!
//! Batch handlers (`instrument`, `sample`, `flakiness`) log and count a
//! failing row, then move on to the next one.

pub mod batch;
pub mod compile;
pub mod flakiness;
pub mod instrument;
pub mod mine;
pub mod sample;
pub mod stats;

pub use batch::{harness_with_overrides, select_rows, split_seed_configs, BatchSummary};
pub use compile::{execute_compile, git_clone_args};
pub use flakiness::execute_flakiness;
pub use instrument::execute_instrument;
pub use mine::execute_mine;
pub use sample::execute_sample;
pub use stats::{execute_stats, render_stats_table};
