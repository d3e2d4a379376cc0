// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Production server command.
//!
//! Templates are compiled once at startup. Any template error aborts startup;
//! edits on disk are not picked up until the process restarts.

use crate::config::{Config, Overrides};
use crate::server::{build_state, http::create_server};

/// Runs the production server.
pub async fn run(overrides: Overrides) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    config.apply(&overrides);

    let state = build_state(&config, false)?;
    let addr = config.addr();
    tracing::info!(
        "Serving {} template(s) from {}",
        state.adapter.renderer().template_set().len(),
        config.templates.root_dir.display()
    );

    println!("Server: http://{}", addr);
    create_server(&addr, state, config.server.static_dir.clone()).await
}
