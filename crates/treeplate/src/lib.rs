// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]
#![allow(clippy::result_large_err)]

//! # treeplate
//!
//! Compiles a directory tree of `{{ action }}` templates into one template
//! set and renders it for HTTP responses.
//!
//! ## Features
//!
//! - Template names derived from paths (`foo/home.html`)
//! - Production mode: compile once, no filesystem access afterwards
//! - Development mode: rebuild only when a template file changed
//! - New template files picked up without a restart
//! - Content negotiation adapter for HTML and XHTML
//! - Pluggable filesystem, including an in-memory one for tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use treeplate::{load_templates, NegotiationAdapter, OsFileSystem, TemplateOptions};
//!
//! let options = TemplateOptions::new("./templates").hot_reload(cfg!(debug_assertions));
//! let adapter = NegotiationAdapter::new(load_templates(Arc::new(OsFileSystem), options)?);
//!
//! let mut body = Vec::new();
//! adapter.process(&mut body, "foo/home.html", serde_json::json!({ "Title": "Hello" }))?;
//! ```

/// Syntax tree of compiled templates.
pub mod ast;
/// Template compilation.
pub mod compiler;
/// Error types and reporting.
pub mod error;
/// Template execution.
mod exec;
/// Filesystem access.
pub mod fs;
/// Builtin and user helper functions.
pub mod funcs;
/// File discovery and change detection.
pub mod index;
/// In-memory filesystem for tests.
pub mod memory_fs;
/// Content negotiation.
pub mod negotiate;
/// Template parser.
mod parser;
/// Static and reloading renderers.
pub mod renderer;
/// Compiled template sets.
pub mod set;

pub use compiler::{ActionCompiler, Template, TemplateCompiler};
pub use error::*;
pub use exec::{escape_html, MAX_DEPTH};
pub use fs::{FileSystem, FsEntry, OsFileSystem};
pub use funcs::{HelperFn, Helpers};
pub use index::{discover, FileIndex, FileRecord, ScanReport};
pub use memory_fs::{FsCalls, MemoryFileSystem};
pub use negotiate::{NegotiationAdapter, HTML, XHTML};
pub use renderer::{
    load_templates, load_templates_with, to_value, ReloadingRenderer, RenderInstance, Renderer,
    StaticRenderer, TemplateOptions,
};
pub use set::TemplateSet;

// Re-export the data value type
pub use serde_json::Value;
