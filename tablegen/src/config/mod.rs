//! Configuration module

pub mod defaults;
mod properties;
mod settings;

pub use properties::Properties;
pub use settings::{GeneratorConfig, RunConfig};
