// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! HTTP server rendering templates by request path.
//!
//! This is a thin adapter: the request path names the template, the query
//! string becomes the data, and the negotiation adapter produces the body.
//! Only file-backed names are reachable, so `{{define}}` partials cannot be
//! requested directly.

use std::path::PathBuf;
use std::sync::Arc;

use percent_encoding::percent_decode_str;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use serde_json::{json, Map, Value};
use tower_http::services::ServeDir;
use treeplate::{NegotiationAdapter, TreeplateError};

/// Shared application state.
#[derive(Debug)]
pub struct AppState {
    /// Renders templates and answers negotiation questions.
    pub adapter: NegotiationAdapter,
    /// Template rendered for `/`.
    pub index: String,
    /// Suffix every file-backed template name ends with.
    pub suffix: String,
}

impl AppState {
    /// Creates state whose `/` renders `index<suffix>`.
    pub fn new(adapter: NegotiationAdapter, suffix: &str) -> Self {
        Self {
            adapter,
            index: format!("index{}", suffix),
            suffix: suffix.to_string(),
        }
    }
}

/// Builds the application router.
pub fn app(state: Arc<AppState>, static_dir: Option<PathBuf>) -> Router {
    let router = Router::new();
    let router = match static_dir {
        Some(dir) => router.nest_service("/static", ServeDir::new(dir)),
        None => router,
    };
    router.fallback(render_handler).with_state(state)
}

/// Binds `addr` and serves until the process is stopped.
pub async fn create_server(
    addr: &str,
    state: Arc<AppState>,
    static_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state, static_dir)).await?;
    Ok(())
}

/// Template name for a request path, or `None` if the path cannot name a
/// template file.
///
/// The path is percent-decoded. `/` maps to `index`, and names without
/// `suffix` are rejected.
pub fn template_name(path: &str, index: &str, suffix: &str) -> Option<String> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let name = match decoded.trim_start_matches('/') {
        "" => return Some(index.to_string()),
        name => name,
    };
    if !name.ends_with(suffix) || name.len() == suffix.len() {
        return None;
    }
    Some(name.to_string())
}

/// Request data handed to templates: `{"Query": {...}, "Path": "/..."}`.
pub fn request_data(uri: &Uri) -> Value {
    let query: Map<String, Value> = form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
        .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
        .collect();
    json!({ "Query": query, "Path": uri.path() })
}

async fn render_handler(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !state.adapter.accepts(accept) {
        tracing::debug!("Not acceptable: {} for {}", accept, uri.path());
        return (StatusCode::NOT_ACCEPTABLE, "Not Acceptable").into_response();
    }

    let Some(name) = template_name(uri.path(), &state.index, &state.suffix) else {
        tracing::debug!("No template file for {}", uri.path());
        return (StatusCode::NOT_FOUND, format!("no template for {}", uri.path())).into_response();
    };
    let data = request_data(&uri);

    let renderer = Arc::clone(&state);
    let rendered = tokio::task::spawn_blocking(move || {
        let mut body = Vec::new();
        renderer.adapter.process(&mut body, &name, data).map(|()| body)
    })
    .await;

    match rendered {
        Ok(Ok(body)) => (
            [(header::CONTENT_TYPE, state.adapter.content_type())],
            body,
        )
            .into_response(),
        Ok(Err(TreeplateError::NotFound(name))) => {
            tracing::debug!("Template {:?} not found", name);
            (StatusCode::NOT_FOUND, format!("template {:?} not found", name)).into_response()
        }
        Ok(Err(err)) => {
            tracing::warn!("Rendering {} failed: {}", uri.path(), err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
        Err(err) => {
            tracing::error!("Render task failed: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_pairs_become_data() {
        let uri: Uri = "/foo/home.html?Title=Hello%20World&lang=en".parse().unwrap();
        assert_eq!(
            request_data(&uri),
            json!({"Query": {"Title": "Hello World", "lang": "en"}, "Path": "/foo/home.html"})
        );
    }

    #[test]
    fn path_names_are_decoded() {
        assert_eq!(
            template_name("/my%20page.html", "index.html", ".html").as_deref(),
            Some("my page.html")
        );
        assert_eq!(
            template_name("/", "index.html", ".html").as_deref(),
            Some("index.html")
        );
        assert_eq!(template_name("/%FF.html", "index.html", ".html"), None);
    }

    #[test]
    fn names_without_the_suffix_are_rejected() {
        assert_eq!(template_name("/header", "index.html", ".html"), None);
        assert_eq!(template_name("/.html", "index.html", ".html"), None);
        assert_eq!(
            template_name("/foo/bar/baz.html", "index.html", ".html").as_deref(),
            Some("foo/bar/baz.html")
        );
    }

    #[test]
    fn missing_query_gives_empty_object() {
        let uri: Uri = "/".parse().unwrap();
        assert_eq!(request_data(&uri), json!({"Query": {}, "Path": "/"}));
    }
}
