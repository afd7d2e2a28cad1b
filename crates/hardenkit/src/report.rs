//! Report store - timestamped, immutable audit snapshots
//!
//! Reports are saved as `<label>-<timestamp>.txt` inside the reports
//! directory. Files are created exclusively and marked read-only, so a saved
//! snapshot is never overwritten. Any readable file can be loaded back, which
//! matches the interactive "enter the path to the report" flow.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::compare::ComparisonResult;
use crate::error::{Error, Result};
use crate::types::Label;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

static REPORT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(pre|post)-(\d{8}T\d{6}\.\d{3}Z)(?:-(\d+))?\.txt$").expect("valid regex")
});

/// A captured point-in-time audit result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub label: Label,
    pub path: PathBuf,
    pub captured_at: DateTime<Utc>,
    #[serde(skip)]
    pub raw_content: String,
}

/// Listing entry for a stored report (content not loaded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredReport {
    pub label: Label,
    pub path: PathBuf,
    pub captured_at: DateTime<Utc>,
}

/// Directory-backed report storage
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a new snapshot and return it
    pub fn save(&self, label: Label, content: &str) -> Result<Report> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;

        let captured_at = Utc::now();
        let stamp = captured_at.format(TIMESTAMP_FORMAT).to_string();
        let (path, mut file) = self.create_unique(&format!("{label}-{stamp}"), "txt")?;

        file.write_all(content.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| Error::io(&path, e))?;
        drop(file);
        mark_read_only(&path)?;

        log::info!("Saved {} report to {}", label, path.display());
        Ok(Report {
            label,
            path,
            // Millisecond precision, as encoded in the file name
            captured_at: parse_stamp(&stamp).unwrap_or(captured_at),
            raw_content: content.to_string(),
        })
    }

    /// Load a report, inferring its label from the file name.
    ///
    /// Store-named files and names with a `pre`/`post` token are accepted
    /// (e.g. `lynis-report-post.dat`); anything else is [`Error::ReportNotFound`].
    pub fn load(&self, input: &str) -> Result<Report> {
        let path = resolve(input)?;
        let label = infer_label(&path).ok_or_else(|| {
            log::debug!("No pre/post token in {}", path.display());
            Error::ReportNotFound { path: path.clone() }
        })?;
        read_report(path, label)
    }

    /// Load a report whose label the caller already knows
    pub fn load_as(&self, input: &str, label: Label) -> Result<Report> {
        let path = resolve(input)?;
        read_report(path, label)
    }

    /// Stored reports, newest first
    pub fn list(&self) -> Result<Vec<StoredReport>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.dir, e)),
        };

        let mut reports: Vec<(StoredReport, u32)> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(caps) = REPORT_NAME.captures(name) else {
                continue;
            };
            let label = if &caps[1] == "pre" {
                Label::Pre
            } else {
                Label::Post
            };
            let Some(captured_at) = parse_stamp(&caps[2]) else {
                continue;
            };
            // Collision suffix orders reports saved within the same millisecond
            let seq = caps.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
            reports.push((
                StoredReport {
                    label,
                    path: entry.path(),
                    captured_at,
                },
                seq,
            ));
        }

        reports.sort_by(|(a, a_seq), (b, b_seq)| {
            b.captured_at
                .cmp(&a.captured_at)
                .then_with(|| b_seq.cmp(a_seq))
        });
        Ok(reports.into_iter().map(|(report, _)| report).collect())
    }

    /// Most recent stored report with this label
    pub fn latest(&self, label: Label) -> Result<Report> {
        let stored = self
            .list()?
            .into_iter()
            .find(|r| r.label == label)
            .ok_or_else(|| Error::ReportNotFound {
                path: self.dir.join(format!("{label}-*.txt")),
            })?;
        read_report(stored.path, label)
    }

    /// Persist a comparison as JSON. Only done on explicit request.
    pub fn save_comparison(&self, comparison: &ComparisonResult) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let stamp = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let (path, mut file) = self.create_unique(&format!("comparison-{stamp}"), "json")?;

        let json = serde_json::to_string_pretty(comparison)?;
        file.write_all(json.as_bytes())
            .map_err(|e| Error::io(&path, e))?;
        log::info!("Saved comparison to {}", path.display());
        Ok(path)
    }

    /// Exclusively create `<stem>.<ext>`, adding `-N` on collision
    fn create_unique(&self, stem: &str, ext: &str) -> Result<(PathBuf, fs::File)> {
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{stem}.{ext}")
            } else {
                format!("{stem}-{attempt}.{ext}")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(Error::io(&path, e)),
            }
        }
    }
}

/// Validate and expand caller-supplied path input
pub fn resolve(input: &str) -> Result<PathBuf> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidPath(input.to_string()));
    }
    let expanded = shellexpand::full(trimmed).unwrap_or(std::borrow::Cow::Borrowed(trimmed));
    Ok(PathBuf::from(expanded.as_ref()))
}

fn read_report(path: PathBuf, label: Label) -> Result<Report> {
    let meta = match fs::metadata(&path) {
        Ok(meta) if meta.is_file() => meta,
        _ => return Err(Error::ReportNotFound { path }),
    };
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::debug!("Cannot read {}: {}", path.display(), e);
            return Err(Error::ReportNotFound { path });
        }
    };

    let captured_at = stamp_from_name(&path)
        .or_else(|| meta.modified().ok().map(DateTime::<Utc>::from))
        .unwrap_or_else(Utc::now);

    Ok(Report {
        label,
        path,
        captured_at,
        raw_content: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

fn infer_label(path: &Path) -> Option<Label> {
    let stem = path.file_stem()?.to_str()?.to_lowercase();
    let mut found = None;
    for token in stem.split(|c: char| !c.is_ascii_alphanumeric()) {
        let label = match token {
            "pre" => Label::Pre,
            "post" => Label::Post,
            _ => continue,
        };
        if found.is_some_and(|f| f != label) {
            return None;
        }
        found = Some(label);
    }
    found
}

fn stamp_from_name(path: &Path) -> Option<DateTime<Utc>> {
    let name = path.file_name()?.to_str()?;
    let caps = REPORT_NAME.captures(name)?;
    parse_stamp(&caps[2])
}

fn parse_stamp(stamp: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn mark_read_only(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)
        .map_err(|e| Error::io(path, e))?
        .permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms).map_err(|e| Error::io(path, e))
}
