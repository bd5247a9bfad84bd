//! Talker contract and shared machinery for pluggable comic metadata sources.
//!
//! A **talker** bridges a comic-tagging host application to one remote
//! metadata service: it searches by title, fetches full metadata for a
//! selected match, and maps the remote schema into the host's normalized
//! record shape. This crate defines that contract plus the pieces every
//! talker needs: the record types, raw-record cache, config file shape,
//! title/issue-number normalization, and the error taxonomy.

pub mod cache;
pub mod config;
pub mod error;
pub mod issue_number;
pub mod metadata;
pub mod talker;
pub mod title;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::metadata::*;
    pub use crate::talker::*;
}
