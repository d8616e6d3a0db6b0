#![deny(unsafe_code)]
//! # whetstone-mutation
//!
//! Everything that touches the working template set:
//!
//! - [`WorkingSet`]: the mutable copy of the template directory
//! - [`EditApplier`]: applies a [`Mutation`]'s edits in declared order
//! - [`BackupManager`]: round-numbered snapshots with verified, swap-in restore
//!
//! Mutations are authored externally and loaded as a [`MutationList`]; this
//! crate never invents or reorders them.

pub mod applier;
pub mod backup;
pub mod error;
pub mod types;
pub mod working_set;

pub use applier::{AppliedEdits, EditApplier};
pub use backup::{BackupHandle, BackupManager};
pub use error::{BackupError, EditError, EditFailure, MutationListError};
pub use types::{ContentHash, Edit, EditKind, Mutation, MutationList};
pub use working_set::WorkingSet;
