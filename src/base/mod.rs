//! Structural atoms shared by every stage of the pipeline: source
//! positions and the error taxonomy.

mod span;

pub use span::Span;
