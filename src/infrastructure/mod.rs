//! Infrastructure layer: I/O implementations and DI container
//!
//! This layer implements I/O boundary traits, loads corpora and wires up services.

pub mod corpus;
pub mod di;
pub mod error;
pub mod traits;

pub use corpus::{parse_corpus, CorpusLoader};
pub use error::{InfraError, InfraResult};
