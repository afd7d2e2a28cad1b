//! Report comparison
//!
//! Reports are parsed into a map of finding id → state, then diffed by id.
//! Line positions never matter, so reordering inside a report cannot produce
//! a difference. All collections are ordered sets for deterministic output.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::report::Report;

/// Finding id → finding state
pub type Findings = BTreeMap<String, String>;

/// One named, stateful check result
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub state: String,
}

/// A finding present in both reports with a different state
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FindingChange {
    pub id: String,
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub pre_ref: PathBuf,
    pub post_ref: PathBuf,
    pub added: BTreeSet<Finding>,
    pub removed: BTreeSet<Finding>,
    pub changed: BTreeSet<FindingChange>,
}

impl ComparisonResult {
    /// No differences at all
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

/// Turns raw report text into findings
pub trait FindingParser: Send + Sync {
    /// Parse a report. The error string is a diagnostic for the user.
    fn parse(&self, content: &str) -> std::result::Result<Findings, String>;
}

/// Parser for `key=value` audit data, including Lynis `name[]=` arrays
///
/// - `hardening_index=67` → finding `hardening_index` with state `67`
/// - `warning[]=SSH-7408|Root login allowed|-|-|` → finding `warning[]:SSH-7408`
///   with state `Root login allowed|-|-`
/// - `installed_package[]=openssh` → finding `installed_package[]:openssh`
///   with state `present`
///
/// A repeated id keeps every distinct state, sorted and joined with `; `.
#[derive(Debug, Default)]
pub struct KeyValueParser;

static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9_.:/\-]+)(\[\])?\s*=\s*(.*?)\s*$").expect("valid regex")
});

impl FindingParser for KeyValueParser {
    fn parse(&self, content: &str) -> std::result::Result<Findings, String> {
        let mut states: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let caps = LINE
                .captures(line)
                .ok_or_else(|| format!("line {}: expected key=value, got {:?}", idx + 1, trimmed))?;

            let key = &caps[1];
            let value = &caps[3];
            let (id, state) = if caps.get(2).is_some() {
                match value.split_once('|') {
                    Some((test_id, rest)) if !test_id.trim().is_empty() => (
                        format!("{key}[]:{}", test_id.trim()),
                        rest.trim_end_matches('|').to_string(),
                    ),
                    _ => (format!("{key}[]:{value}"), "present".to_string()),
                }
            } else {
                (key.to_string(), value.to_string())
            };
            states.entry(id).or_default().insert(state);
        }

        if states.is_empty() {
            return Err("report contains no findings".to_string());
        }

        Ok(states
            .into_iter()
            .map(|(id, values)| (id, values.into_iter().collect::<Vec<_>>().join("; ")))
            .collect())
    }
}

/// Compares two reports through a [`FindingParser`]
pub struct Comparator {
    parser: Box<dyn FindingParser>,
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(Box::new(KeyValueParser))
    }
}

impl Comparator {
    pub fn new(parser: Box<dyn FindingParser>) -> Self {
        Self { parser }
    }

    /// Diff `post` against `pre`.
    ///
    /// Both reports are parsed before anything is compared; a parse failure
    /// on either side aborts with [`Error::ParseError`] naming that side.
    pub fn compare(&self, pre: &Report, post: &Report) -> Result<ComparisonResult> {
        let parse = |report: &Report| {
            self.parser
                .parse(&report.raw_content)
                .map_err(|message| Error::ParseError {
                    label: report.label,
                    message,
                })
        };
        let before = parse(pre)?;
        let after = parse(post)?;

        let result = diff(pre.path.clone(), &before, post.path.clone(), &after);
        log::debug!(
            "Compared {} and {}: +{} -{} ~{}",
            pre.path.display(),
            post.path.display(),
            result.added.len(),
            result.removed.len(),
            result.changed.len()
        );
        Ok(result)
    }
}

/// Diff two finding maps by id
pub fn diff(
    pre_ref: PathBuf,
    pre: &Findings,
    post_ref: PathBuf,
    post: &Findings,
) -> ComparisonResult {
    let mut added = BTreeSet::new();
    let mut changed = BTreeSet::new();
    for (id, new) in post {
        match pre.get(id) {
            None => {
                added.insert(Finding {
                    id: id.clone(),
                    state: new.clone(),
                });
            }
            Some(old) if old != new => {
                changed.insert(FindingChange {
                    id: id.clone(),
                    old: old.clone(),
                    new: new.clone(),
                });
            }
            Some(_) => {}
        }
    }

    let removed = pre
        .iter()
        .filter(|(id, _)| !post.contains_key(*id))
        .map(|(id, state)| Finding {
            id: id.clone(),
            state: state.clone(),
        })
        .collect();

    ComparisonResult {
        pre_ref,
        post_ref,
        added,
        removed,
        changed,
    }
}
