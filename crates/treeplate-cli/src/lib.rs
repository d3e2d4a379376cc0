// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! treeplate CLI library.
//!
//! This crate provides the command-line interface and HTTP server for
//! treeplate template trees.
//!
//! # Usage
//!
//! This crate is primarily used through the `treeplate` binary:
//!
//! ```bash
//! treeplate dev      # Serve templates, reloading on change
//! treeplate serve    # Serve templates compiled once
//! treeplate check    # Compile templates and list their names
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `treeplate.toml` in the working directory.

/// CLI commands (dev, serve, check).
pub mod commands;
/// Project configuration from `treeplate.toml`.
pub mod config;
/// HTTP server rendering templates.
pub mod server;
