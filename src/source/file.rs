//! Submissions read from a JSON file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use gridmap_types::SubmitMetrics;

use super::MetricsSource;

/// Polls a `SubmitMetrics` JSON file and yields it each time it changes.
///
/// A change is a new modification time. A file that fails to read or parse
/// is retried on the next poll.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    last_error: Option<String>,
    last_modified: Option<SystemTime>,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            last_error: None,
            last_modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    fn read(&mut self) -> Option<SubmitMetrics> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                self.last_error = Some(format!("Read error: {}", e));
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(s) => {
                self.last_error = None;
                Some(s)
            }
            Err(e) => {
                self.last_error = Some(format!("Parse error: {}", e));
                None
            }
        }
    }
}

impl MetricsSource for FileSource {
    fn poll(&mut self) -> Option<SubmitMetrics> {
        let modified = self.modified();
        let changed = match (self.last_modified, modified) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(last), Some(current)) => current != last,
        };
        if !changed {
            return None;
        }

        let submission = self.read()?;
        self.last_modified = modified;
        Some(submission)
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
