//! Shared domain records for docsmith.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Stat
// ---------------------------------------------------------------------------

/// A statistics record collected for a document node during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// What was measured (e.g. `content`).
    pub title: String,
    /// Short human-readable summary.
    pub figures: String,
    /// Free-form detail lines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl Stat {
    /// Create a record without details.
    pub fn new(title: impl Into<String>, figures: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            figures: figures.into(),
            details: Vec::new(),
        }
    }

    /// Attach a detail line.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Git history
// ---------------------------------------------------------------------------

/// A commit author or contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

/// One entry of a file's version-control history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub author: Person,
    pub date: NaiveDate,
    pub message: String,
}

/// Authorship summary derived from a file's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    /// Author of the earliest commit.
    pub author: Person,
    /// Date of the earliest commit.
    pub publish_date: NaiveDate,
    /// Date of the latest commit.
    pub last_modified_date: NaiveDate,
    /// Everyone else who touched the file, deduplicated by email.
    pub contributors: Vec<Person>,
}

impl GitInfo {
    /// Summarize a history ordered newest first, as `git log` prints it.
    ///
    /// Returns `None` for an empty history.
    pub fn from_history(history: &[Commit]) -> Option<Self> {
        let latest = history.first()?;
        let earliest = history.last()?;

        let mut contributors: Vec<Person> = Vec::new();
        for commit in history {
            if commit.author.email == earliest.author.email {
                continue;
            }
            if contributors.iter().any(|p| p.email == commit.author.email) {
                continue;
            }
            contributors.push(commit.author.clone());
        }

        Some(Self {
            author: earliest.author.clone(),
            publish_date: earliest.date,
            last_modified_date: latest.date,
            contributors,
        })
    }
}
