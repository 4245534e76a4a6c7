//! Version-control history reader backed by the `git` CLI.

use std::path::Path;

use chrono::NaiveDate;
use tokio::process::Command;
use tracing::{debug, instrument};

use docsmith_dispatch::Context;
use docsmith_shared::{Commit, DocsmithError, GitInfo, Person, Result};

const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';

/// `git log` format: sha, author name, author email, date, subject.
const LOG_FORMAT: &str = "--pretty=format:%H%x1f%aN%x1f%aE%x1f%ad%x1f%s%x1e";

/// Read the history of `path`, newest commit first.
///
/// Fails when `git` cannot be started or writes anything to stderr. A file
/// without history yields an empty list.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn read_history(ctx: &Context, path: &Path) -> Result<Vec<Commit>> {
    tokio::fs::metadata(path)
        .await
        .map_err(|e| DocsmithError::io(path, e))?;

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file = path.file_name().unwrap_or(path.as_os_str());

    let mut command = Command::new("git");
    command
        .args(["log", "--date=short", LOG_FORMAT, "--follow", "--"])
        .arg(file)
        .current_dir(dir)
        .kill_on_drop(true);

    let output = ctx.run(command.output()).await?.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            DocsmithError::Git(format!("reading history of {} failed: git not found in PATH", path.display()))
        }
        _ => DocsmithError::Git(format!("failed to run git log for {}: {e}", path.display())),
    })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return Err(DocsmithError::Git(format!(
            "git log for {} failed:\n{}",
            path.display(),
            stderr.trim()
        )));
    }

    let history = parse_log(&String::from_utf8_lossy(&output.stdout))?;
    debug!(commits = history.len(), "read history");
    Ok(history)
}

/// Read the history of `path` and summarize it.
pub async fn read_git_info(ctx: &Context, path: &Path) -> Result<Option<GitInfo>> {
    let history = read_history(ctx, path).await?;
    Ok(GitInfo::from_history(&history))
}

/// Parse `git log` output produced with [`LOG_FORMAT`].
pub fn parse_log(raw: &str) -> Result<Vec<Commit>> {
    raw.split(RECORD_SEP)
        .map(str::trim)
        .filter(|record| !record.is_empty())
        .map(parse_record)
        .collect()
}

fn parse_record(record: &str) -> Result<Commit> {
    let fields: Vec<&str> = record.split(FIELD_SEP).collect();
    let [sha, name, email, date, message] = fields.as_slice() else {
        return Err(DocsmithError::parse(format!(
            "malformed git log record with {} fields",
            fields.len()
        )));
    };
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| DocsmithError::parse(format!("invalid commit date {date:?}: {e}")))?;

    Ok(Commit {
        sha: sha.trim().to_string(),
        author: Person {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
        },
        date,
        message: message.trim().to_string(),
    })
}
