// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Content negotiation on top of a [`Renderer`].
//!
//! [`NegotiationAdapter`] answers the questions an HTTP layer asks before
//! rendering: can this media range be produced, and with which content type.
//! The content type is shared by every request served through the adapter
//! and can be changed at runtime.

use crate::error::Result;
use crate::renderer::Renderer;
use serde_json::Value;
use std::io::Write;
use std::sync::{PoisonError, RwLock};

/// The HTML media type.
pub const HTML: &str = "text/html";

/// The XHTML media type.
pub const XHTML: &str = "application/xhtml+xml";

/// Wraps a renderer for use behind HTTP content negotiation.
#[derive(Debug)]
pub struct NegotiationAdapter {
    renderer: Box<dyn Renderer>,
    content_type: RwLock<String>,
}

impl NegotiationAdapter {
    /// Creates an adapter producing `text/html`.
    pub fn new(renderer: Box<dyn Renderer>) -> Self {
        Self {
            renderer,
            content_type: RwLock::new(HTML.to_string()),
        }
    }

    /// Builder form of [`set_content_type`](Self::set_content_type).
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        self.set_content_type(content_type);
        self
    }

    /// The wrapped renderer.
    pub fn renderer(&self) -> &dyn Renderer {
        self.renderer.as_ref()
    }

    /// The content type responses are produced with.
    pub fn content_type(&self) -> String {
        self.content_type
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Changes the content type for all later responses.
    pub fn set_content_type(&self, content_type: impl Into<String>) {
        *self
            .content_type
            .write()
            .unwrap_or_else(PoisonError::into_inner) = content_type.into();
    }

    /// Whether output can be produced for `media_range`.
    ///
    /// Parameters are ignored and types compare case-insensitively. HTML and
    /// XHTML are interchangeable. The language is not taken into account.
    pub fn can_process(&self, media_range: &str, _language: &str) -> bool {
        let range = essence(media_range);
        let configured = essence(&self.content_type());
        range == configured || (is_html(&range) && is_html(&configured))
    }

    /// Evaluates a full `Accept` header.
    ///
    /// The most specific range that matches decides: an exact type beats
    /// `type/*`, which beats `*/*`. A matching range with `q=0` rejects. A
    /// missing or blank header accepts everything.
    pub fn accepts(&self, accept: &str) -> bool {
        if accept.trim().is_empty() {
            return true;
        }

        let configured = essence(&self.content_type());
        let main_type = configured.split('/').next().unwrap_or_default();

        let mut best: Option<(u8, f32)> = None;
        for range in accept.split(',') {
            let media = essence(range);
            let specificity = if self.can_process(&media, "") {
                2
            } else if media == "*/*" {
                0
            } else if media.strip_suffix("/*") == Some(main_type) {
                1
            } else {
                continue;
            };

            let quality = quality(range);
            best = match best {
                Some((s, q)) if s > specificity || (s == specificity && q >= quality) => {
                    Some((s, q))
                }
                _ => Some((specificity, quality)),
            };
        }

        best.is_some_and(|(_, q)| q > 0.0)
    }

    /// Renders template `name` against `data` into `writer`.
    ///
    /// Nothing is written if rendering fails.
    pub fn process<W: Write + ?Sized>(&self, writer: &mut W, name: &str, data: Value) -> Result<()> {
        self.renderer.instance(name, data)?.render(writer)
    }
}

fn essence(media_range: &str) -> String {
    media_range
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_html(essence: &str) -> bool {
    essence == HTML || essence == XHTML
}

fn quality(media_range: &str) -> f32 {
    media_range
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("q"))
        .and_then(|(_, value)| value.trim().parse::<f32>().ok())
        .map_or(1.0, |q| q.clamp(0.0, 1.0))
}
