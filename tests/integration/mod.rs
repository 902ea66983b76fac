//! Integration tests for restoring snapshots into a destination tree

mod cli_contracts;
mod concurrency_bounds;
mod fail_fast;
mod support;
