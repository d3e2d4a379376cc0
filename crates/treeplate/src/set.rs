// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiled template sets.
//!
//! A [`TemplateSet`] is every template compiled from one template root, plus
//! the helper table they were compiled against. Sets are never mutated once
//! built; picking up changes means building a new set.

use crate::compiler::{Template, TemplateCompiler};
use crate::error::{Result, TreeplateError};
use crate::exec::Exec;
use crate::fs::{template_name, FileSystem};
use crate::funcs::Helpers;
use crate::index::FileIndex;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// An immutable collection of compiled templates addressed by name.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: HashMap<String, Arc<Template>>,
    helpers: Helpers,
}

impl TemplateSet {
    /// Creates a set from already compiled templates.
    ///
    /// When two templates share a name the later one wins.
    pub fn from_templates(templates: impl IntoIterator<Item = Template>, helpers: Helpers) -> Self {
        let templates = templates
            .into_iter()
            .map(|t| (t.name().to_string(), Arc::new(t)))
            .collect();
        Self { templates, helpers }
    }

    /// Reads and compiles every file tracked by `index`.
    ///
    /// Files are compiled in path order; a `{{define}}` in a later file
    /// replaces a template of the same name from an earlier one.
    ///
    /// # Errors
    ///
    /// Fails on the first file that cannot be read, is not UTF-8, or does not
    /// compile.
    pub fn build(
        fs: &dyn FileSystem,
        root: &Path,
        index: &FileIndex,
        compiler: &dyn TemplateCompiler,
        helpers: &Helpers,
    ) -> Result<Self> {
        let mut templates = HashMap::with_capacity(index.len());

        for path in index.paths() {
            let Some(name) = template_name(root, path) else {
                tracing::debug!("Skipping {} outside {}", path.display(), root.display());
                continue;
            };

            let bytes = fs.read(path).map_err(|source| TreeplateError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let source = String::from_utf8(bytes).map_err(|e| TreeplateError::Read {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            })?;

            for template in compiler.compile(&name, path, &source, helpers)? {
                let name = template.name().to_string();
                if let Some(previous) = templates.insert(name, Arc::new(template)) {
                    tracing::debug!(
                        "Template {:?} from {} redefined",
                        previous.name(),
                        previous.origin().display()
                    );
                }
            }
        }

        tracing::debug!("Compiled {} template(s) from {}", templates.len(), root.display());
        Ok(Self {
            templates,
            helpers: helpers.clone(),
        })
    }

    /// Looks up a template.
    pub fn get(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates.get(name)
    }

    /// Whether the set has a template called `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Template names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// The helper table the set was compiled with.
    pub fn helpers(&self) -> &Helpers {
        &self.helpers
    }

    /// Renders the template `name` against `data`.
    pub fn execute(&self, name: &str, data: &Value) -> Result<String> {
        let mut exec = Exec::new(self, data);
        exec.call(name, data, 0)?;
        Ok(exec.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ActionCompiler;
    use crate::index::discover;
    use crate::MemoryFileSystem;
    use serde_json::json;

    fn build(fs: &MemoryFileSystem) -> Result<TemplateSet> {
        let root = Path::new("t");
        let index = discover(fs, root, ".html")?;
        TemplateSet::build(fs, root, &index, &ActionCompiler, &Helpers::new())
    }

    fn render(source: &str, data: Value) -> Result<String> {
        let fs = MemoryFileSystem::new();
        fs.write("t/page.html", source);
        build(&fs)?.execute("page.html", &data)
    }

    #[test]
    fn names_are_relative_paths() {
        let fs = MemoryFileSystem::new();
        fs.write("t/foo/home.html", "<html>{{.Title}}</html>");
        fs.write("t/foo/bar/baz.html", "<html>Baz</html>");
        let set = build(&fs).unwrap();

        assert_eq!(set.names(), ["foo/bar/baz.html", "foo/home.html"]);
        assert_eq!(
            set.execute("foo/home.html", &json!({"Title": "Hello"})).unwrap(),
            "<html>Hello</html>"
        );
        assert_eq!(
            set.get("foo/home.html").unwrap().origin(),
            Path::new("t/foo/home.html")
        );
    }

    #[test]
    fn output_is_escaped_but_text_is_not() {
        let out = render("<b>{{.}}</b>", json!("<i>&</i>")).unwrap();
        assert_eq!(out, "<b>&lt;i&gt;&amp;&lt;/i&gt;</b>");
    }

    #[test]
    fn conditionals() {
        let source = "{{if .A}}a{{else if .B}}b{{else}}c{{end}}";
        assert_eq!(render(source, json!({"A": 1})).unwrap(), "a");
        assert_eq!(render(source, json!({"B": "x"})).unwrap(), "b");
        assert_eq!(render(source, json!({})).unwrap(), "c");
    }

    #[test]
    fn range_over_arrays_and_objects() {
        let source = "{{range .Items}}[{{.}}]{{else}}none{{end}}";
        assert_eq!(render(source, json!({"Items": [1, 2, 3]})).unwrap(), "[1][2][3]");
        assert_eq!(render(source, json!({"Items": {"b": 2, "a": 1}})).unwrap(), "[1][2]");
        assert_eq!(render(source, json!({"Items": []})).unwrap(), "none");
        assert!(render(source, json!({"Items": 4})).is_err());
    }

    #[test]
    fn with_rebinds_dot_and_root_stays() {
        let source = "{{with .User}}{{.Name}} of {{$.Site}}{{else}}anonymous{{end}}";
        assert_eq!(
            render(source, json!({"User": {"Name": "Ada"}, "Site": "home"})).unwrap(),
            "Ada of home"
        );
        assert_eq!(render(source, json!({"Site": "home"})).unwrap(), "anonymous");
    }

    #[test]
    fn pipelines_append_the_previous_result() {
        assert_eq!(render(r#"{{"a b" | urlquery}}"#, json!(null)).unwrap(), "a+b");
        assert_eq!(render("{{.Items | len}}", json!({"Items": [1, 2]})).unwrap(), "2");
        assert_eq!(
            render(r#"{{if and .A (eq .B "x")}}yes{{end}}"#, json!({"A": true, "B": "x"})).unwrap(),
            "yes"
        );
    }

    #[test]
    fn defined_templates_are_called_without_reescaping() {
        let source = r#"{{define "item"}}<li>{{.}}</li>{{end}}<ul>{{range .}}{{template "item" .}}{{end}}</ul>"#;
        assert_eq!(
            render(source, json!(["a", "<b>"])).unwrap(),
            "<ul><li>a</li><li>&lt;b&gt;</li></ul>"
        );
    }

    #[test]
    fn templates_can_call_across_files() {
        let fs = MemoryFileSystem::new();
        fs.write("t/layout.html", r#"{{define "header"}}<h1>{{.}}</h1>{{end}}"#);
        fs.write("t/page.html", r#"{{template "header" .Title}}body"#);
        let set = build(&fs).unwrap();

        assert_eq!(
            set.execute("page.html", &json!({"Title": "Hi"})).unwrap(),
            "<h1>Hi</h1>body"
        );
    }

    #[test]
    fn field_on_non_object_is_an_execution_error() {
        let err = render("{{.Name.First}}", json!({"Name": "Ada"})).unwrap_err();
        assert!(matches!(err, TreeplateError::Execution { .. }));
        assert!(err.to_string().contains("can't evaluate field First"));
    }

    #[test]
    fn missing_fields_print_nothing() {
        assert_eq!(render("[{{.Missing.Deeper}}]", json!({})).unwrap(), "[]");
    }

    #[test]
    fn recursion_is_bounded() {
        let err = render(r#"{{define "loop"}}{{template "loop" .}}{{end}}{{template "loop"}}"#, json!(null))
            .unwrap_err();
        assert!(err.to_string().contains("maximum template depth"));
    }

    #[test]
    fn calling_an_unknown_template_fails() {
        let err = render(r#"{{template "nope"}}"#, json!(null)).unwrap_err();
        assert!(matches!(err, TreeplateError::Execution { .. }));
    }

    #[test]
    fn unknown_name_is_not_found() {
        let fs = MemoryFileSystem::new();
        fs.write("t/page.html", "x");
        let err = build(&fs).unwrap().execute("other.html", &json!(null)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn invalid_utf8_is_a_read_error() {
        let fs = MemoryFileSystem::new();
        fs.write("t/page.html", vec![0xff, 0xfe]);
        let err = build(&fs).unwrap_err();
        assert!(matches!(err, TreeplateError::Read { .. }));
    }

    #[test]
    fn syntax_errors_name_the_file() {
        let fs = MemoryFileSystem::new();
        fs.write("t/good.html", "ok");
        fs.write("t/bad.html", "{{if .A}}never closed");
        let err = build(&fs).unwrap_err();
        assert_eq!(err.template_name(), Some("bad.html"));
    }
}
