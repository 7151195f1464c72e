//! DAE Core - streaming schema-driven loader for COLLADA scenes.
//!
//! This crate provides:
//!
//! - **Schema combinators**: declarative rules (`hierarchy`, `hoist`,
//!   `library`, `attributes`, `text_value`, `rename`, `multiple`, `noop`)
//!   kept in a lazily resolved [`SchemaRegistry`]
//! - **Stack machine**: a [`Context`] interpreting open/text/close events
//!   in a single forward pass, resolving `id` and `sid` references
//! - **COLLADA support**: the 1.4 dialect and a chunked [`Loader`] that
//!   produces a [`Document`] for downstream mesh and material bakers
//!
//! # Example
//!
//! ```ignore
//! use dae_core::load_collada;
//!
//! let doc = load_collada("scene.dae")?;
//! println!("up axis: {:?}", doc.root().path("asset/upAxis"));
//! if let Some(effect) = doc.resolve_url("#brick-effect") {
//!     println!("shading: {:?}", effect.path("technique/type"));
//! }
//! ```

pub mod collada;
pub mod context;
pub mod dialect;
pub mod document;
pub mod error;
pub mod loader;
pub mod namespace;
pub mod schema;
pub mod tokenizer;
pub mod trace;
pub mod value;

// Re-export commonly used types
pub use context::Context;
pub use dialect::Dialect;
pub use document::Document;
pub use error::{ErrorKind, ParseError, ParseResult};
pub use loader::{
    load_collada, load_collada_from_reader, load_collada_from_string, load_collada_with_options,
    Loader, LoaderOptions,
};
pub use schema::{Binding, MergePolicy, SchemaNode, SchemaRef, SchemaRegistry};
pub use trace::{LogTracer, Tracer};
pub use value::{Attributes, Value};
