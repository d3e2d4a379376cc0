// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP serving of template trees.

/// HTTP server implementation using Axum.
pub mod http;

use std::sync::Arc;

use treeplate::{load_templates, NegotiationAdapter, OsFileSystem, TemplateOptions};

use crate::config::Config;
use http::AppState;

/// Loads the configured templates and wraps them for serving.
pub fn build_state(config: &Config, hot_reload: bool) -> anyhow::Result<Arc<AppState>> {
    let options = TemplateOptions::new(&config.templates.root_dir)
        .suffix(&config.templates.suffix)
        .hot_reload(hot_reload);
    let renderer = load_templates(Arc::new(OsFileSystem), options)?;
    let adapter = NegotiationAdapter::new(renderer).with_content_type(&config.server.content_type);
    Ok(Arc::new(AppState::new(adapter, &config.templates.suffix)))
}
