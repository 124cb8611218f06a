//! Provider-neutral assembly of streamed model output.
//!
//! The assembler folds [`StreamEvent`](ravel_types::llm::StreamEvent)s into a
//! [`StepOutput`] while reporting progress to an observer.

pub mod assembler;

pub use assembler::{StepOutput, StreamAssembler, assemble};
