//! Shared types for the open-hlasm analysis workspace.
//!
//! This crate provides the foundational building blocks that the analysis
//! crates share:
//!
//! - **Source location tracking**: [`Position`], [`Range`], [`Location`], [`FileId`]
//! - **Diagnostics**: [`Diagnostic`], [`Severity`]
//! - **Source preprocessing**: [`normalize_line_endings`]
//!
//! # Design Principles
//!
//! - **Zero dependencies**: This crate has no external dependencies. It
//!   contains only plain Rust types. Engine crates add `miette`/`thiserror`
//!   on top for rich error rendering.
//! - **Shared, not prescriptive**: The types define minimal contracts; the
//!   analysis engine attaches its own meaning to codes and file ids.

mod diagnostic;
mod position;
mod source;

pub use diagnostic::{Diagnostic, Severity};
pub use position::{FileId, Location, Position, Range};
pub use source::normalize_line_endings;
