use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ProjectIdentity {
    pub name: String,
    pub repo_path: PathBuf,
}

/// Lowercase `input` and collapse every run of characters outside
/// `[a-z0-9]` into a single `-`, trimming leading and trailing dashes.
///
/// The result is safe to use in container names, DNS labels and directory
/// names.
pub fn slugify(input: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new("[^a-z0-9]+").expect("static regex"));
    let lowered = input.to_lowercase();
    re.replace_all(&lowered, "-").trim_matches('-').to_string()
}

/// Environment name for a (project, branch) pair.
pub fn environment_name(project: &str, branch: &str) -> String {
    format!("{}-{}", slugify(project), slugify(branch))
}

impl ProjectIdentity {
    /// Build a `ProjectIdentity` from a repository checkout.
    ///
    /// The path is canonicalized so that the same repository always maps
    /// to the same project regardless of how it was spelled on the command
    /// line.
    pub fn from_repo(repo: &Path) -> Result<Self> {
        let canonical = repo.canonicalize().map_err(|e| {
            Error::Validation(format!("cannot resolve repository {}: {e}", repo.display()))
        })?;
        let name = canonical
            .file_name()
            .map(|f| slugify(&f.to_string_lossy()))
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                Error::Validation(format!(
                    "cannot derive a project name from {}",
                    canonical.display()
                ))
            })?;

        Ok(Self {
            name,
            repo_path: canonical,
        })
    }
}
