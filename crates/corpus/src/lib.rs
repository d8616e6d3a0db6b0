#![deny(unsafe_code)]
//! # whetstone-corpus
//!
//! The fixed, ordered set of test cases a template set is scored against,
//! and the boundary to whatever turns templates plus a test case into a
//! document.
//!
//! Generation is external. [`DocumentGenerator`] is the contract; the
//! stand-ins in [`generator`] exist to exercise the optimizer without a
//! live model and are kept apart from any scoring logic.

pub mod error;
pub mod generator;
pub mod types;

pub use error::{CorpusError, GenerationError};
pub use generator::{DocumentGenerator, FailingGenerator, FlakyGenerator, TemplateRenderGenerator};
pub use types::{Corpus, TestCase};
