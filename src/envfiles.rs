//! Discovery and parsing of untracked `.env` files.
//!
//! Worktrees only contain tracked files, so a repository's local `.env`
//! files are captured from the main checkout, persisted per environment and
//! written into each worktree.

use std::collections::BTreeMap;
use std::path::{Component, Path};

use crate::error::{Error, Result};

/// Directories never searched for env files.
const SKIP_DIRS: &[&str] = &["node_modules", "target", "vendor", "dist", "build"];

/// How deep below the repository root env files are looked for.
const MAX_DEPTH: usize = 3;

/// Whether a file name looks like an env file we should carry over.
/// Checked-in templates such as `.env.example` are skipped.
pub fn is_env_file(name: &str) -> bool {
    if name == ".env" {
        return true;
    }
    match name.strip_prefix(".env.") {
        Some(suffix) => !matches!(suffix, "example" | "sample" | "template" | "dist"),
        None => false,
    }
}

/// Find env files under `root`, returning `(relative_path, content)` pairs
/// sorted by path. Relative paths always use `/`.
pub fn discover(root: &Path) -> Result<Vec<(String, String)>> {
    let mut found = Vec::new();
    walk(root, root, 0, &mut found)?;
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

fn walk(root: &Path, dir: &Path, depth: usize, found: &mut Vec<(String, String)>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            if depth + 1 < MAX_DEPTH && !name.starts_with('.') && !SKIP_DIRS.contains(&name.as_str()) {
                walk(root, &path, depth + 1, found)?;
            }
        } else if file_type.is_file() && is_env_file(&name) {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| Error::Validation(e.to_string()))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            let content = std::fs::read_to_string(&path)?;
            found.push((relative, content));
        }
    }
    Ok(())
}

/// Write env files into `dest`, creating parent directories as needed.
/// Paths escaping `dest` are rejected.
pub fn write_into<'a>(dest: &Path, files: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<usize> {
    let mut written = 0;
    for (relative, content) in files {
        let rel = Path::new(relative);
        if rel.is_absolute() || rel.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(Error::Validation(format!("env file path '{relative}' escapes the worktree")));
        }
        let target = dest.join(rel);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, content)?;
        written += 1;
    }
    Ok(written)
}

/// Parse dotenv-style content into key/value pairs.
///
/// Supports `#` comments, an optional `export ` prefix and single or double
/// quoted values. Later keys win.
pub fn parse(content: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value.trim();
        let value = if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value[1..value.len() - 1].to_string()
        } else {
            // Unquoted values may carry a trailing comment.
            value.split(" #").next().unwrap_or(value).trim().to_string()
        };
        vars.insert(key.to_string(), value);
    }
    vars
}

/// Variables from the root-level env files, in the order the files are
/// given: `.env` first, then `.env.*` overrides.
pub fn root_variables<'a>(files: impl IntoIterator<Item = (&'a str, &'a str)>) -> BTreeMap<String, String> {
    let mut root: Vec<(&str, &str)> = files
        .into_iter()
        .filter(|(path, _)| !path.contains('/'))
        .collect();
    root.sort_by_key(|(path, _)| (*path != ".env", *path));

    let mut vars = BTreeMap::new();
    for (_, content) in root {
        vars.extend(parse(content));
    }
    vars
}
