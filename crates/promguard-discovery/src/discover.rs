use crate::{ChangeType, Entry, EntryItem};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobSet, GlobSetBuilder};
use promguard_parser::parse_rules;
use promguard_types::RulePath;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use walkdir::WalkDir;

/// Parse rule-file content into one [`Entry`] per rule block.
pub fn entries_from_content(
    content: &str,
    source_path: RulePath,
    reported_path: RulePath,
    state: ChangeType,
) -> Vec<Entry> {
    parse_rules(content)
        .into_iter()
        .map(|parsed| Entry {
            source_path: source_path.clone(),
            reported_path: reported_path.clone(),
            state,
            item: match parsed {
                Ok(rule) => EntryItem::Rule(rule),
                Err(err) => EntryItem::ParseError {
                    line: err.line,
                    message: err.message,
                },
            },
        })
        .collect()
}

/// Discover rule files under `root` matching the include globs.
///
/// Entries from files matching an exclude glob are tagged `Excluded`;
/// everything else is `Noop`. Symlinked files report under their
/// canonical path, so two links to one file share a reported path.
pub fn discover_glob(
    root: &Utf8Path,
    include: &[String],
    exclude: &[String],
) -> anyhow::Result<Vec<Entry>> {
    let include_set = build_globset(include).context("compile include globset")?;
    let exclude_set = build_globset(exclude).context("compile exclude globset")?;

    let mut out = Vec::new();
    for file in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() || e.path_is_symlink())
        .filter_map(|e| pathbuf_to_utf8(e.path().to_path_buf()))
    {
        let rel = relative_to(&file, root);
        if !include.is_empty() && !include_set.is_match(rel.as_str()) {
            continue;
        }
        let state = if exclude_set.is_match(rel.as_str()) {
            ChangeType::Excluded
        } else {
            ChangeType::Noop
        };

        out.extend(read_entries(root, &file, &rel, state));
    }
    Ok(out)
}

/// Discover rule files and tag them with git change states.
///
/// Walks the include globs like [`discover_glob`] (unchanged files come
/// back `Noop`), then overlays `git diff --name-status <base>..<head>`:
/// added and modified files get their state replaced, deleted files are
/// re-read from the base revision via `git show` and enter the batch as
/// `Removed` entries.
pub fn discover_git(
    root: &Utf8Path,
    include: &[String],
    exclude: &[String],
    base: &str,
    head: &str,
) -> anyhow::Result<Vec<Entry>> {
    let include_set = build_globset(include).context("compile include globset")?;

    let output = Command::new("git")
        .current_dir(root)
        .args(["diff", "--name-status", &format!("{base}..{head}")])
        .output()
        .context("failed to run git")?;
    if !output.status.success() {
        anyhow::bail!(
            "git diff --name-status failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let changes = parse_name_status(&stdout);

    let mut states: BTreeMap<String, ChangeType> = BTreeMap::new();
    let mut removed: Vec<String> = Vec::new();
    for (status, path) in changes {
        if !include.is_empty() && !include_set.is_match(&path) {
            continue;
        }
        match status {
            'A' => {
                states.insert(path, ChangeType::Added);
            }
            'M' => {
                states.insert(path, ChangeType::Modified);
            }
            'D' => removed.push(path),
            other => {
                tracing::debug!(status = %other, path = %path, "ignoring git change status");
            }
        }
    }

    let mut entries = discover_glob(root, include, exclude)?;
    for entry in &mut entries {
        if entry.state == ChangeType::Excluded {
            continue;
        }
        if let Some(state) = states.get(entry.source_path.as_str()) {
            entry.state = *state;
        }
    }

    for path in removed {
        let show = Command::new("git")
            .current_dir(root)
            .args(["show", &format!("{base}:{path}")])
            .output()
            .context("failed to run git show")?;
        let rule_path = RulePath::new(&path);
        if show.status.success() {
            let content = String::from_utf8_lossy(&show.stdout);
            entries.extend(entries_from_content(
                &content,
                rule_path.clone(),
                rule_path,
                ChangeType::Removed,
            ));
        } else {
            entries.push(Entry {
                source_path: rule_path.clone(),
                reported_path: rule_path,
                state: ChangeType::Removed,
                item: EntryItem::PathError(format!(
                    "unable to read {path} at {base}: {}",
                    String::from_utf8_lossy(&show.stderr).trim()
                )),
            });
        }
    }

    Ok(entries)
}

/// Parse `git diff --name-status` output into `(status, path)` pairs.
/// Renames (`R<score>\told\tnew`) split into a delete plus an add.
pub fn parse_name_status(output: &str) -> Vec<(char, String)> {
    let mut out = Vec::new();
    for line in output.lines() {
        let mut fields = line.split('\t');
        let Some(status) = fields.next().filter(|s| !s.is_empty()) else {
            continue;
        };
        let code = status.chars().next().unwrap_or('?');
        match code {
            'R' | 'C' => {
                let old = fields.next();
                let new = fields.next();
                if let (Some(old), Some(new)) = (old, new) {
                    if code == 'R' {
                        out.push(('D', old.to_string()));
                    }
                    out.push(('A', new.to_string()));
                }
            }
            _ => {
                if let Some(path) = fields.next() {
                    out.push((code, path.to_string()));
                }
            }
        }
    }
    out
}

fn read_entries(
    root: &Utf8Path,
    file: &Utf8Path,
    rel: &RulePath,
    state: ChangeType,
) -> Vec<Entry> {
    let reported = reported_path(root, file, rel);
    match std::fs::read_to_string(file) {
        Ok(content) => entries_from_content(&content, rel.clone(), reported, state),
        Err(err) => vec![Entry {
            source_path: rel.clone(),
            reported_path: reported,
            state,
            item: EntryItem::PathError(err.to_string()),
        }],
    }
}

/// Canonical path a file reports under: symlinks resolve to their target
/// relative to the discovery root.
fn reported_path(root: &Utf8Path, file: &Utf8Path, rel: &RulePath) -> RulePath {
    let Ok(canonical) = std::fs::canonicalize(file.as_std_path()) else {
        return rel.clone();
    };
    let Ok(canonical_root) = std::fs::canonicalize(root.as_std_path()) else {
        return rel.clone();
    };
    let Some(canonical) = pathbuf_to_utf8(canonical) else {
        return rel.clone();
    };
    let Some(canonical_root) = pathbuf_to_utf8(canonical_root) else {
        return rel.clone();
    };
    match canonical.strip_prefix(&canonical_root) {
        Ok(stripped) => RulePath::new(stripped.as_str()),
        Err(_) => rel.clone(),
    }
}

fn relative_to(file: &Utf8Path, root: &Utf8Path) -> RulePath {
    let rel = file.strip_prefix(root).unwrap_or(file);
    RulePath::new(rel.as_str())
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn pathbuf_to_utf8(path: PathBuf) -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).ok()
}
