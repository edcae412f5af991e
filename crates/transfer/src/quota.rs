//! Pre-flight quota checks. Pure, no I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::progress::format_bytes;

const GIB: u64 = 1024 * 1024 * 1024;

/// Upload limits enforced before any session is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaLimits {
    pub max_files: u64,
    pub max_total_bytes: u64,
    pub max_single_file_bytes: u64,
    /// Maximum number of directory segments in a relative path.
    pub max_depth: u64,
    /// Maximum character length of one directory segment.
    pub max_segment_length: u64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            max_files: 500,
            max_total_bytes: 2 * GIB,
            max_single_file_bytes: 2 * GIB,
            max_depth: 5,
            max_segment_length: 40,
        }
    }
}

/// Which limit was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaLimit {
    MaxFiles,
    MaxTotalBytes,
    MaxSingleFileBytes,
    MaxDepth,
    MaxSegmentLength,
}

impl fmt::Display for QuotaLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuotaLimit::MaxFiles => "file count",
            QuotaLimit::MaxTotalBytes => "total size",
            QuotaLimit::MaxSingleFileBytes => "file size",
            QuotaLimit::MaxDepth => "folder depth",
            QuotaLimit::MaxSegmentLength => "folder name length",
        };
        f.write_str(name)
    }
}

/// A limit violation: which limit, the observed value and the maximum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "{limit} limit exceeded{}: {}",
    subject_suffix(.subject),
    compare(.limit, .observed, .max)
)]
pub struct QuotaExceeded {
    pub limit: QuotaLimit,
    pub observed: u64,
    pub max: u64,
    /// File or path that tripped the limit, when there is one.
    pub subject: Option<String>,
}

/// Byte limits read as sizes, the others as plain counts.
fn compare(limit: &QuotaLimit, observed: &u64, max: &u64) -> String {
    match limit {
        QuotaLimit::MaxTotalBytes | QuotaLimit::MaxSingleFileBytes => {
            format!("{} > {}", format_bytes(*observed), format_bytes(*max))
        }
        _ => format!("{observed} > {max}"),
    }
}

fn subject_suffix(subject: &Option<String>) -> String {
    subject
        .as_deref()
        .map(|s| format!(" ({s})"))
        .unwrap_or_default()
}

/// One file as seen by the quota check.
#[derive(Debug, Clone, Copy)]
pub struct QuotaCandidate<'a> {
    /// Slash-separated path, filename last.
    pub relative_path: &'a str,
    pub size: u64,
}

impl QuotaLimits {
    /// Checks `files` (and the dropped folder root, if any) against the
    /// limits, in order: count, total size, each file size, each path depth,
    /// each directory segment length. Stops at the first violation.
    pub fn check(
        &self,
        files: &[QuotaCandidate<'_>],
        folder_root: Option<&str>,
    ) -> Result<(), QuotaExceeded> {
        let count = files.len() as u64;
        if count > self.max_files {
            return Err(QuotaExceeded {
                limit: QuotaLimit::MaxFiles,
                observed: count,
                max: self.max_files,
                subject: None,
            });
        }

        let total = files.iter().fold(0u64, |acc, f| acc.saturating_add(f.size));
        if total > self.max_total_bytes {
            return Err(QuotaExceeded {
                limit: QuotaLimit::MaxTotalBytes,
                observed: total,
                max: self.max_total_bytes,
                subject: None,
            });
        }

        if let Some(file) = files.iter().find(|f| f.size > self.max_single_file_bytes) {
            return Err(QuotaExceeded {
                limit: QuotaLimit::MaxSingleFileBytes,
                observed: file.size,
                max: self.max_single_file_bytes,
                subject: Some(file.relative_path.to_string()),
            });
        }

        for file in files {
            let depth = directory_segments(file.relative_path).count() as u64;
            if depth > self.max_depth {
                return Err(QuotaExceeded {
                    limit: QuotaLimit::MaxDepth,
                    observed: depth,
                    max: self.max_depth,
                    subject: Some(file.relative_path.to_string()),
                });
            }
        }

        let root_segments = folder_root
            .into_iter()
            .flat_map(|root| root.split('/').filter(|s| !s.is_empty()));
        let file_segments = files
            .iter()
            .flat_map(|f| directory_segments(f.relative_path));
        for segment in root_segments.chain(file_segments) {
            let len = segment.chars().count() as u64;
            if len > self.max_segment_length {
                return Err(QuotaExceeded {
                    limit: QuotaLimit::MaxSegmentLength,
                    observed: len,
                    max: self.max_segment_length,
                    subject: Some(segment.to_string()),
                });
            }
        }

        Ok(())
    }
}

/// Directory segments of a relative path (the filename is excluded).
fn directory_segments(path: &str) -> impl Iterator<Item = &str> {
    let dir = path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    dir.split('/').filter(|s| !s.is_empty())
}
