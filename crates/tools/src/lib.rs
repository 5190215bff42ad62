//! Tackle tools: typed tool contracts for model-issued calls.
//!
//! This crate is the protocol boundary between semi-structured model output
//! and host functions.
//!
//! # Overview
//!
//! - **Schema derivation**: a function declares its parameters with a
//!   [`Signature`]; [`derive`] turns that into a [`Schema`] (kinds,
//!   descriptions, defaults, required set).
//! - **Tool documents**: [`build_doc`] renders the `{"type": "function", ...}`
//!   document advertised to the model.
//! - **Binding and invocation**: [`Tool::invoke`] binds [`CallArgs`] to the
//!   declared parameters, validates them against the schema and runs the
//!   function, reporting failures as [`ToolError`].
//! - **Registry**: [`ToolRegistry`] resolves calls by name.
//!
//! # Example
//!
//! ```
//! use tools::{CallArgs, FunctionTool, Param, Signature, ToolRegistry};
//!
//! let mut registry = ToolRegistry::new();
//! registry.register_function(FunctionTool::builder(
//!     Signature::new("shout")
//!         .doc("Upper-case the given text.")
//!         .param(Param::new::<String>("text").describe("text to shout")),
//!     |args| Ok(args.get::<String>("text")?.to_uppercase()),
//! ))?;
//!
//! let out = registry.invoke("shout", CallArgs::new().named("text", "hi")).unwrap();
//! assert_eq!(out, "HI");
//! # Ok::<(), tools::RegistryError>(())
//! ```

mod binding;
mod document;
mod error;
mod function;
mod registry;
mod schema;
mod tool;

pub use binding::{Arguments, CallArgs, bind, validate};
pub use document::{FunctionDocument, METADATA_KEY, ToolDocument, build_doc, parameters_document, strip_key};
pub use error::{ArgumentError, RegistryError, Result, SchemaDerivationError, ToolError};
pub use function::{BoxError, FunctionTool, FunctionToolBuilder};
pub use registry::ToolRegistry;
pub use schema::{Param, ParamKind, ParamType, ParameterSpec, Schema, SchemaBuilder, Signature, derive};
pub use tool::Tool;
