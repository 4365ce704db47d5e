//! Code generation: naming, rendering, path resolution and reconciliation

mod code_generator;
pub mod java_source;
mod java_types;
mod merge;
mod naming;
mod path_resolver;
mod reconciler;
mod renderer;

pub use code_generator::*;
pub use java_types::JavaType;
pub use merge::{EntityMerger, MergeError, MergeOutcome, MergeReport, GENERATED_ANNOTATION};
pub use naming::*;
pub use path_resolver::resolve_path;
pub use reconciler::{ArtifactKind, Outcome, Reconciler};
pub use renderer::{
    bundled_template, join_package, resolve_template_dir, RenderBuffer, RenderModel,
    TemplateRenderer, TEMPLATE_EXTENSION,
};
