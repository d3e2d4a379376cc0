// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Renderers hand out render instances bound to the current template set.
//!
//! # Modes
//!
//! - [`StaticRenderer`] compiles once and never touches the filesystem again.
//! - [`ReloadingRenderer`] checks the template root before every request and
//!   rebuilds the whole set when a tracked file's modification time advanced.
//!
//! [`load_templates`] picks one of the two from [`TemplateOptions::hot_reload`].
//!
//! # Reload protocol
//!
//! Each [`ReloadingRenderer::instance`] call runs one pass under the
//! renderer's state lock:
//!
//! 1. An untracked template name triggers rediscovery of the root, so new
//!    files are picked up without a restart.
//! 2. Every tracked file is checked. Newer files mark the index changed,
//!    vanished files are dropped, and other stat failures are logged and
//!    ignored.
//! 3. A changed index, or a previous failed rebuild, compiles a new set and
//!    swaps it in. Otherwise the current set is reused as is. When the
//!    rebuild fails, only templates whose files did not change since the
//!    last good build are served from the previous set.
//! 4. The name resolves only if the set has it and its file is still
//!    tracked.
//!
//! Rendering itself happens outside the lock against an `Arc` of the set.

use crate::compiler::{ActionCompiler, TemplateCompiler};
use crate::error::{Result, TreeplateError};
use crate::fs::{clean_root, template_path, FileSystem};
use crate::funcs::Helpers;
use crate::index::{discover, FileIndex};
use crate::set::TemplateSet;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Source of render instances.
pub trait Renderer: Send + Sync + Debug {
    /// Returns an instance that renders template `name` against `data`.
    ///
    /// # Errors
    ///
    /// [`TreeplateError::NotFound`] if there is no such template. Reloading
    /// renderers also surface discovery and compile failures here.
    fn instance(&self, name: &str, data: Value) -> Result<RenderInstance>;

    /// The template set currently in use.
    fn template_set(&self) -> Arc<TemplateSet>;
}

/// A template bound to its data, ready to render.
#[derive(Debug, Clone)]
pub struct RenderInstance {
    set: Arc<TemplateSet>,
    name: String,
    data: Value,
}

impl RenderInstance {
    fn new(set: Arc<TemplateSet>, name: &str, data: Value) -> Self {
        Self {
            set,
            name: name.to_string(),
            data,
        }
    }

    /// Renders into `writer`.
    ///
    /// Output is produced in full before anything is written, so a failed
    /// execution leaves `writer` untouched.
    pub fn render<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        let output = self.render_to_string()?;
        writer.write_all(output.as_bytes())?;
        Ok(())
    }

    /// Renders into a new string.
    pub fn render_to_string(&self) -> Result<String> {
        self.set.execute(&self.name, &self.data)
    }

    /// The template set the instance renders from.
    pub fn template_set(&self) -> &Arc<TemplateSet> {
        &self.set
    }

    /// Name of the template to render.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Options for [`load_templates`].
#[derive(Debug, Clone)]
pub struct TemplateOptions {
    /// Directory holding the templates.
    pub root_dir: PathBuf,
    /// Filename suffix of template files.
    pub suffix: String,
    /// Helper functions available to templates.
    pub helpers: Helpers,
    /// Whether to pick up template changes without a restart.
    pub hot_reload: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("templates"),
            suffix: ".html".to_string(),
            helpers: Helpers::new(),
            hot_reload: false,
        }
    }
}

impl TemplateOptions {
    /// Options for templates under `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Sets the filename suffix.
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Sets the helper functions.
    pub fn helpers(mut self, helpers: Helpers) -> Self {
        self.helpers = helpers;
        self
    }

    /// Enables or disables hot reloading.
    pub fn hot_reload(mut self, hot_reload: bool) -> Self {
        self.hot_reload = hot_reload;
        self
    }
}

/// Discovers and compiles the templates described by `options`.
///
/// Returns a [`ReloadingRenderer`] when hot reloading is enabled and a
/// [`StaticRenderer`] otherwise.
///
/// # Errors
///
/// Fails if the root cannot be walked, holds no templates, or any template
/// fails to read or compile.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use treeplate::{load_templates, OsFileSystem, TemplateOptions};
///
/// let renderer = load_templates(Arc::new(OsFileSystem), TemplateOptions::new("templates"))?;
/// let html = renderer
///     .instance("index.html", serde_json::json!({"Title": "Home"}))?
///     .render_to_string()?;
/// # Ok::<(), treeplate::TreeplateError>(())
/// ```
pub fn load_templates(
    fs: Arc<dyn FileSystem>,
    options: TemplateOptions,
) -> Result<Box<dyn Renderer>> {
    load_templates_with(fs, Arc::new(ActionCompiler), options)
}

/// Like [`load_templates`], with a custom compiler.
pub fn load_templates_with(
    fs: Arc<dyn FileSystem>,
    compiler: Arc<dyn TemplateCompiler>,
    options: TemplateOptions,
) -> Result<Box<dyn Renderer>> {
    if options.hot_reload {
        Ok(Box::new(ReloadingRenderer::new(fs, compiler, options)?))
    } else {
        Ok(Box::new(StaticRenderer::load(fs.as_ref(), compiler.as_ref(), &options)?))
    }
}

/// Converts any serializable value into template data.
pub fn to_value<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Renderer over a template set fixed at construction.
#[derive(Debug, Clone)]
pub struct StaticRenderer {
    set: Arc<TemplateSet>,
}

impl StaticRenderer {
    /// Wraps an already built set.
    pub fn new(set: TemplateSet) -> Self {
        Self { set: Arc::new(set) }
    }

    /// Discovers and compiles templates once.
    pub fn load(
        fs: &dyn FileSystem,
        compiler: &dyn TemplateCompiler,
        options: &TemplateOptions,
    ) -> Result<Self> {
        let root = clean_root(&options.root_dir);
        let index = discover(fs, &root, &options.suffix)?;
        let set = TemplateSet::build(fs, &root, &index, compiler, &options.helpers)?;
        tracing::debug!("Loaded {} template(s) from {}", set.len(), root.display());
        Ok(Self::new(set))
    }
}

impl Renderer for StaticRenderer {
    fn instance(&self, name: &str, data: Value) -> Result<RenderInstance> {
        if !self.set.contains(name) {
            return Err(TreeplateError::NotFound(name.to_string()));
        }
        Ok(RenderInstance::new(Arc::clone(&self.set), name, data))
    }

    fn template_set(&self) -> Arc<TemplateSet> {
        Arc::clone(&self.set)
    }
}

#[derive(Debug)]
struct ReloadState {
    index: FileIndex,
    /// Files modified since the last successful build; non-empty while a
    /// rebuild is pending.
    stale: BTreeSet<PathBuf>,
}

/// Renderer that rebuilds its template set when template files change.
#[derive(Debug)]
pub struct ReloadingRenderer {
    fs: Arc<dyn FileSystem>,
    compiler: Arc<dyn TemplateCompiler>,
    root: PathBuf,
    suffix: String,
    helpers: Helpers,
    state: Mutex<ReloadState>,
    current: RwLock<Arc<TemplateSet>>,
}

impl ReloadingRenderer {
    /// Discovers and compiles templates, recording the modification time of
    /// every file so the first request does not rebuild.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        compiler: Arc<dyn TemplateCompiler>,
        options: TemplateOptions,
    ) -> Result<Self> {
        let root = clean_root(&options.root_dir);
        let mut index = discover(fs.as_ref(), &root, &options.suffix)?;
        index.scan(fs.as_ref());
        let set = TemplateSet::build(
            fs.as_ref(),
            &root,
            &index,
            compiler.as_ref(),
            &options.helpers,
        )?;
        tracing::debug!(
            "Loaded {} template(s) from {} with hot reload",
            set.len(),
            root.display()
        );

        Ok(Self {
            fs,
            compiler,
            root,
            suffix: options.suffix,
            helpers: options.helpers,
            state: Mutex::new(ReloadState {
                index,
                stale: BTreeSet::new(),
            }),
            current: RwLock::new(Arc::new(set)),
        })
    }

    /// The template root being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths currently tracked, in sorted order.
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.index.paths().map(Path::to_path_buf).collect()
    }

    fn current(&self) -> Arc<TemplateSet> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Runs one invalidation pass for a request of `name` and returns the set
    /// to render it from.
    fn checkout(&self, name: &str) -> Result<Arc<TemplateSet>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let requested = template_path(&self.root, name);

        if !state.index.contains(&requested) {
            tracing::debug!(
                "Template {:?} is not tracked, rediscovering {}",
                name,
                self.root.display()
            );
            let fresh = discover(self.fs.as_ref(), &self.root, &self.suffix)?;
            state.index.refresh(fresh);
        }

        let report = state.index.scan(self.fs.as_ref());
        state.stale.extend(report.modified.iter().cloned());
        if !state.stale.is_empty() {
            tracing::debug!(
                "Rebuilding templates: {} changed, {} removed",
                report.modified.len(),
                report.removed.len()
            );
            let rebuilt = TemplateSet::build(
                self.fs.as_ref(),
                &self.root,
                &state.index,
                self.compiler.as_ref(),
                &self.helpers,
            );
            match rebuilt {
                Ok(set) => {
                    *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(set);
                    state.stale.clear();
                }
                Err(err) => {
                    let previous = self.current();
                    let edited = state.stale.contains(&requested)
                        || previous
                            .get(name)
                            .is_some_and(|template| state.stale.contains(template.origin()));
                    if edited || concerns(&err, name, &requested) || !previous.contains(name) {
                        return Err(err);
                    }
                    tracing::warn!("Serving previous templates for {:?}: {}", name, err);
                }
            }
        }

        let set = self.current();
        let tracked = set
            .get(name)
            .is_some_and(|template| state.index.contains(template.origin()));
        if tracked {
            Ok(set)
        } else {
            Err(TreeplateError::NotFound(name.to_string()))
        }
    }
}

/// Whether a rebuild failure was caused by the requested template itself.
fn concerns(err: &TreeplateError, name: &str, path: &Path) -> bool {
    match err {
        TreeplateError::Read { path: failed, .. } => failed == path,
        other => other.template_name() == Some(name),
    }
}

impl Renderer for ReloadingRenderer {
    fn instance(&self, name: &str, data: Value) -> Result<RenderInstance> {
        let set = self.checkout(name)?;
        Ok(RenderInstance::new(set, name, data))
    }

    fn template_set(&self) -> Arc<TemplateSet> {
        self.current()
    }
}
