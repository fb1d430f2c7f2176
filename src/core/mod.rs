//! Core types shared by every cortex-fetch module.
//!
//! At the moment this is the error taxonomy: process-level [`CortexError`],
//! per-package [`ResolveError`] and the CLI-facing [`ErrorContext`].

pub mod error;

pub use error::{CortexError, DiagnosticKind, ErrorContext, ResolveError, user_friendly_error};
