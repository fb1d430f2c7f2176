//! Unit test suite for the public cortex-fetch API
//!
//! Drives the resolver and the hand-off layer through the crate's public
//! types, using the in-memory registry and fetcher from `test_utils`. No
//! network, no git.
//!
//! ```bash
//! cargo test --test unit
//! ```

mod handoff_plan;
mod resolver_api;
