// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Project configuration.
//!
//! Configuration is loaded from `treeplate.toml` in the working directory.
//! Every key is optional; command-line flags override the file.
//!
//! # Example Configuration
//!
//! ```toml
//! [templates]
//! root_dir = "templates"
//! suffix = ".html"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! static_dir = "static"
//! content_type = "text/html"
//! ```

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "treeplate.toml";

/// Errors raised while loading `treeplate.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },
    /// The file is not valid configuration.
    #[error("invalid configuration in {}: {source}", path.display())]
    Parse {
        /// Path of the configuration file.
        path: PathBuf,
        /// The TOML error.
        source: toml::de::Error,
    },
}

/// Main configuration structure loaded from `treeplate.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Config {
    /// Template discovery settings.
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Template discovery settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TemplatesConfig {
    /// Directory holding the templates (default: "templates").
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// Filename suffix of template files (default: ".html").
    #[serde(default = "default_suffix")]
    pub suffix: String,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host to bind to (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served under `/static`, if any.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
    /// Content type of rendered responses (default: "text/html").
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_suffix() -> String {
    ".html".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_content_type() -> String {
    treeplate::HTML.to_string()
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            suffix: default_suffix(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            content_type: default_content_type(),
        }
    }
}

impl Config {
    /// Loads configuration from `treeplate.toml` in the current directory.
    ///
    /// If no configuration file exists, returns the default configuration.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No {} found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies command-line overrides.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(root_dir) = &overrides.root_dir {
            self.templates.root_dir = root_dir.clone();
        }
        if let Some(suffix) = &overrides.suffix {
            self.templates.suffix = suffix.clone();
        }
        if let Some(host) = &overrides.host {
            self.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(content_type) = &overrides.content_type {
            self.server.content_type = content_type.clone();
        }
    }

    /// Address the server binds to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Settings given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Template root directory.
    pub root_dir: Option<PathBuf>,
    /// Template filename suffix.
    pub suffix: Option<String>,
    /// Host to bind to.
    pub host: Option<String>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Response content type.
    pub content_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.templates.suffix, ".html");
        assert_eq!(config.addr(), "127.0.0.1:3000");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "[templates]\nroot_dir = \"views\"\n\n[server]\nport = 8080\nstatic_dir = \"public\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.templates.root_dir, PathBuf::from("views"));
        assert_eq!(config.templates.suffix, ".html");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.static_dir, Some(PathBuf::from("public")));
        assert_eq!(config.server.content_type, "text/html");
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn overrides_win() {
        let mut config = Config::default();
        config.apply(&Overrides {
            root_dir: Some(PathBuf::from("site")),
            port: Some(9000),
            content_type: Some(treeplate::XHTML.to_string()),
            ..Overrides::default()
        });

        assert_eq!(config.templates.root_dir, PathBuf::from("site"));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.content_type, treeplate::XHTML);
    }
}
