//! Test discovery
//!
//! Walks a directory tree and turns every directory holding YAML cases into
//! a [`Group`]. Broken files are logged and skipped so one typo does not
//! hide the rest of the suite.

use std::fs;
use std::path::Path;

use regex::Regex;

use crate::common::{Error, Result};

use super::config::{Case, Group, Init};

/// Find all groups under `dir`, nested directories included.
///
/// The root group is named `""`, nested groups `/sub/dir`.
pub fn find(dir: &Path) -> Vec<Group> {
    let mut groups = Vec::new();
    find_in(dir, "", &mut groups);
    groups
}

fn find_in(dir: &Path, name: &str, groups: &mut Vec<Group>) {
    let mut entries: Vec<_> = match fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|entry| entry.ok()).collect(),
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "reading tests directory");
            return;
        }
    };
    entries.sort_by_key(|entry| entry.file_name());

    let mut init = Init::default();
    let mut tests = Vec::new();

    for entry in entries {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        // editor temporaries
        if file_name.starts_with('~') {
            continue;
        }

        let path = entry.path();
        if path.is_dir() {
            find_in(&path, &format!("{}/{}", name, file_name), groups);
            continue;
        }

        if !is_yaml(&path) {
            continue;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "reading test case");
                continue;
            }
        };

        if file_name == "init.yml" || file_name == "init.yaml" {
            match parse_init(&path, &content) {
                Ok(parsed) => init = parsed,
                Err(e) => tracing::error!(file = %path.display(), error = %e, "decoding init config"),
            }
            continue;
        }

        match parse_case(&path, &content) {
            Ok(mut case) => {
                case.filename = file_name;
                tests.push(case);
            }
            Err(e) => tracing::error!(file = %path.display(), error = %e, "decoding test case"),
        }
    }

    if !tests.is_empty() {
        groups.push(Group::new(name, init, tests));
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    )
}

/// Decode one test case
pub fn parse_case(path: &Path, content: &str) -> Result<Case> {
    let mut case: Case = serde_yaml::from_str(content).map_err(|e| Error::CaseParse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    if case.name.is_empty() {
        return Err(Error::CaseParse {
            path: path.display().to_string(),
            reason: "empty test name".to_string(),
        });
    }

    if !case.request.url.is_empty() && case.request.method.is_empty() {
        case.request.method = "GET".to_string();
    }

    Ok(case)
}

/// Decode a group init file
pub fn parse_init(path: &Path, content: &str) -> Result<Init> {
    serde_yaml::from_str(content).map_err(|e| Error::CaseParse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Keep only groups whose name matches `pattern`; an empty pattern keeps all
pub fn filter(groups: Vec<Group>, pattern: &str) -> Result<Vec<Group>> {
    if pattern.is_empty() {
        return Ok(groups);
    }

    let pattern = Regex::new(pattern)
        .map_err(|e| Error::Config(format!("compile pattern '{}': {}", pattern, e)))?;

    Ok(groups
        .into_iter()
        .filter(|group| pattern.is_match(&group.name))
        .collect())
}
