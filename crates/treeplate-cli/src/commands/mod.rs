// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `dev`: serve templates, rebuilding them when files change
//! - `serve`: serve templates compiled once at startup
//! - `check`: compile templates and list their names

/// Template compilation check.
pub mod check;
/// Development server command.
pub mod dev;
/// Production server command.
pub mod serve;
