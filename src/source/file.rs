//! File-based graph source.
//!
//! Polls a JSON file holding a graph payload.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use meshwatch_types::GraphPayload;
use tracing::debug;

use super::GraphSource;

/// Reads graph payloads from a JSON file.
///
/// The source tracks the file's modification time and only returns a
/// payload when the file has changed since the last successful read.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    last_error: Option<String>,
    last_modified: Option<SystemTime>,
    force: bool,
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
            force: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    fn read_file(&mut self) -> Option<GraphPayload> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(payload) => {
                    self.last_error = None;
                    Some(payload)
                }
                Err(e) => {
                    self.last_error = Some(format!("Parse error: {}", e));
                    None
                }
            },
            Err(e) => {
                self.last_error = Some(format!("Read error: {}", e));
                None
            }
        }
    }
}

impl GraphSource for FileSource {
    fn poll(&mut self) -> Option<GraphPayload> {
        let current_modified = self.modified_time();

        let changed = self.force
            || match (&self.last_modified, &current_modified) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(last), Some(current)) => current > last,
            };
        if !changed {
            return None;
        }

        self.force = false;
        let payload = self.read_file()?;
        debug!(path = %self.path.display(), nodes = payload.node_count(), "read graph file");
        self.last_modified = current_modified;
        Some(payload)
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn refresh(&mut self) {
        self.force = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_json() -> &'static str {
        r#"{
            "timestamp": 1700000000,
            "duration": 600,
            "elements": {
                "nodes": [
                    { "data": { "id": "n1", "nodeType": "service", "namespace": "bookinfo", "service": "reviews" } }
                ],
                "edges": []
            }
        }"#
    }

    #[test]
    fn test_file_source_new() {
        let source = FileSource::new("/tmp/graph.json");
        assert_eq!(source.path(), Path::new("/tmp/graph.json"));
        assert_eq!(source.description(), "file: /tmp/graph.json");
        assert!(source.error().is_none());
    }

    #[test]
    fn test_poll_reads_once_until_changed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let mut source = FileSource::new(file.path());

        let payload = source.poll().unwrap();
        assert_eq!(payload.node_count(), 1);
        assert_eq!(payload.timestamp, Some(1_700_000_000));

        assert!(source.poll().is_none());
    }

    #[test]
    fn test_refresh_rereads_unchanged_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_json()).unwrap();

        let mut source = FileSource::new(file.path());
        assert!(source.poll().is_some());
        assert!(source.poll().is_none());

        source.refresh();
        assert!(source.poll().is_some());
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_missing_elements_is_not_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{}}").unwrap();

        let mut source = FileSource::new(file.path());
        let payload = source.poll().unwrap();
        assert!(payload.is_empty());
        assert!(source.error().is_none());
    }

    #[test]
    fn test_missing_file() {
        let mut source = FileSource::new("/nonexistent/path/graph.json");

        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Read error"));
    }

    #[test]
    fn test_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let mut source = FileSource::new(file.path());

        assert!(source.poll().is_none());
        assert!(source.error().unwrap().contains("Parse error"));
    }
}
