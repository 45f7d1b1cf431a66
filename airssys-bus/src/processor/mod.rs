//! Command processor façade.

pub mod builder;
#[allow(clippy::module_inception)]
pub mod processor;

pub use builder::CommandProcessorBuilder;
pub use processor::CommandProcessor;
