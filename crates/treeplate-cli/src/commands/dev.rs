// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Development server command with hot reload.

use crate::config::{Config, Overrides};
use crate::server::{build_state, http::create_server};

/// Runs the development server.
///
/// Template files are checked on every request; changed, added and removed
/// files take effect without a restart.
pub async fn run(overrides: Overrides) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    config.apply(&overrides);

    let state = build_state(&config, true)?;
    let addr = config.addr();

    println!("Templates: {}", config.templates.root_dir.display());
    println!("Server: http://{}", addr);
    println!("Status: reloading templates on change");
    println!();

    create_server(&addr, state, config.server.static_dir.clone()).await
}
