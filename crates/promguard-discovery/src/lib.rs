//! Rule-file discovery for promguard.
//!
//! Walks configured paths, reads rule files into [`Entry`] batches and
//! tags each entry with how it changed relative to a git base revision.
//! Entries own the parsed rules; checks borrow them read-only.

#![forbid(unsafe_code)]

mod discover;

pub use discover::{discover_git, discover_glob, entries_from_content, parse_name_status};

use promguard_parser::Rule;
use promguard_types::RulePath;

/// How an entry changed in the batch under inspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeType {
    Added,
    Modified,
    Removed,
    Noop,
    Excluded,
}

/// What a discovered entry holds: a parsed rule, or why there is none.
#[derive(Clone, Debug)]
pub enum EntryItem {
    /// The file could not be read at all.
    PathError(String),
    /// The rule block could not be parsed.
    ParseError { line: usize, message: String },
    Rule(Rule),
}

/// One rule-file item produced by discovery.
#[derive(Clone, Debug)]
pub struct Entry {
    /// On-disk path, possibly a symlink.
    pub source_path: RulePath,
    /// Canonical path used in reports; multiple source paths may share
    /// one reported path.
    pub reported_path: RulePath,
    pub state: ChangeType,
    pub item: EntryItem,
}

impl Entry {
    /// The parsed rule, when the entry has one.
    pub fn rule(&self) -> Option<&Rule> {
        match &self.item {
            EntryItem::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    /// First source line of the entry, for report ordering.
    pub fn line(&self) -> usize {
        match &self.item {
            EntryItem::Rule(rule) => rule.lines.0,
            EntryItem::ParseError { line, .. } => *line,
            EntryItem::PathError(_) => 0,
        }
    }
}
