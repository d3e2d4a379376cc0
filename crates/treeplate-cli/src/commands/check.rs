// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiles every template once and lists the names they are served under.

use std::sync::Arc;

use treeplate::{load_templates, OsFileSystem, TemplateOptions};

use crate::config::{Config, Overrides};

/// Compiles the configured templates and returns their names, sorted.
pub fn template_names(config: &Config) -> anyhow::Result<Vec<String>> {
    let options = TemplateOptions::new(&config.templates.root_dir).suffix(&config.templates.suffix);
    let renderer = load_templates(Arc::new(OsFileSystem), options)?;
    let set = renderer.template_set();
    Ok(set.names().into_iter().map(str::to_string).collect())
}

/// Runs the check command, printing one template name per line.
pub fn run(overrides: Overrides) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    config.apply(&overrides);

    let names = template_names(&config)?;
    for name in &names {
        println!("{}", name);
    }
    println!(
        "{} template(s) in {}",
        names.len(),
        config.templates.root_dir.display()
    );
    Ok(())
}
