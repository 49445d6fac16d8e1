use anyhow::{Context, Result};
use argbind::{CommandGroup, DeclKind, Route, Signature};
use serde::Serialize;
use std::path::Path;

use crate::manifest::load_manifest;

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub manifest: String,
    pub name: String,
    pub commands: Vec<CommandSummary>,
    pub global_options: usize,
}

#[derive(Debug, Serialize)]
pub struct CommandSummary {
    pub path: String,
    pub aliases: Vec<String>,
    pub options: usize,
    pub params: usize,
    pub groups: usize,
}

/// Load and build the manifest, validating every declaration.
pub fn check_manifest(manifest_path: &Path) -> Result<CheckReport> {
    let loaded = load_manifest(manifest_path)?;
    let (group, catalog) = loaded
        .manifest
        .build()
        .with_context(|| format!("invalid declarations in {}", loaded.path.display()))?;
    tracing::debug!(declarations = catalog.len(), "manifest built");

    let mut commands = Vec::new();
    collect_commands(&group, &mut Vec::new(), &mut commands);

    Ok(CheckReport {
        manifest: loaded.path.display().to_string(),
        name: group.name().to_string(),
        commands,
        global_options: count_global_options(&group),
    })
}

fn collect_commands<'g>(
    group: &'g CommandGroup,
    prefix: &mut Vec<&'g str>,
    out: &mut Vec<CommandSummary>,
) {
    for route in group.routes() {
        match route {
            Route::Command(command) => {
                prefix.push(command.name());
                let (options, params) = count_decls(command.signature());
                out.push(CommandSummary {
                    path: prefix.join(" "),
                    aliases: command.aliases().to_vec(),
                    options,
                    params,
                    groups: command.signature().groups().len(),
                });
                prefix.pop();
            }
            Route::Group(sub) => {
                prefix.push(sub.name());
                collect_commands(sub, prefix, out);
                prefix.pop();
            }
        }
    }
}

fn count_global_options(group: &CommandGroup) -> usize {
    let nested: usize = group
        .routes()
        .iter()
        .map(|route| match route {
            Route::Group(sub) => count_global_options(sub),
            Route::Command(_) => 0,
        })
        .sum();
    count_decls(group.options()).0 + nested
}

fn count_decls(signature: &Signature) -> (usize, usize) {
    signature
        .ids()
        .filter_map(|id| signature.kind(id))
        .fold((0, 0), |(options, params), kind: DeclKind| {
            if kind.is_option() {
                (options + 1, params)
            } else {
                (options, params + 1)
            }
        })
}
