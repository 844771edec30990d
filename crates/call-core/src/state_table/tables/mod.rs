mod callee;
mod caller;
mod common;

use super::builder::StateTableBuilder;
use super::types::MasterStateTable;

pub use common::{ending, ending_without_write, teardown_actions};

/// Assemble the default table from the caller, callee and shared transitions
pub fn build_default_table() -> MasterStateTable {
    let mut builder = StateTableBuilder::new();
    caller::add_caller_transitions(&mut builder);
    callee::add_callee_transitions(&mut builder);
    common::add_common_transitions(&mut builder);
    builder.build()
}
