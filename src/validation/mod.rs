//! Schema compilation and validation.

pub mod compiler;
pub mod engine;
pub mod error;
pub mod formats;
pub mod metrics;
pub mod transform;

pub use compiler::{CompiledSchema, DEFAULT_CACHE_CAPACITY, SchemaCompiler, shape_key};
pub use engine::{UnknownFields, ValidationEngine, ValidationOptions, ValidationOutcome};
pub use error::{FieldError, FieldErrorCode, PathSegment};
pub use metrics::{CacheStats, ValidationMetrics};
