//! Remote path as a segment stack
//!
//! The first segment is always [`ROOT_SEGMENT`]; the stack is never empty.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker of the root segment
pub const ROOT_SEGMENT: &str = "/";

/// Current location in the remote directory hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemotePath {
    segments: Vec<String>,
}

impl Default for RemotePath {
    fn default() -> Self {
        Self::root()
    }
}

impl RemotePath {
    /// The root path
    pub fn root() -> Self {
        Self {
            segments: vec![ROOT_SEGMENT.to_string()],
        }
    }

    /// Parse a `/a/b` style path; empty, `.` and `..` components are skipped
    pub fn parse(path: &str) -> Self {
        let mut remote = Self::root();
        for component in path.split('/').filter(|c| Self::is_valid_segment(c)) {
            remote.segments.push(component.to_string());
        }
        remote
    }

    /// Segments including the root marker
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments including the root marker
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root path
    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// Last segment (the root marker at root)
    pub fn current(&self) -> &str {
        self.segments
            .last()
            .map(String::as_str)
            .unwrap_or(ROOT_SEGMENT)
    }

    /// Append a segment
    ///
    /// Returns `false` and leaves the path unchanged if `name` is empty, the
    /// root marker, or contains a separator.
    pub fn push(&mut self, name: &str) -> bool {
        if !Self::is_valid_segment(name) {
            return false;
        }
        self.segments.push(name.to_string());
        true
    }

    /// Pop the last non-root segment
    pub fn pop(&mut self) -> Option<String> {
        if self.is_root() {
            return None;
        }
        self.segments.pop()
    }

    /// Truncate to (and including) the first occurrence of `segment`
    ///
    /// Returns `false` if `segment` is not part of the path.
    pub fn truncate_to(&mut self, segment: &str) -> bool {
        match self.segments.iter().position(|s| s == segment) {
            Some(index) => {
                self.segments.truncate(index + 1);
                true
            }
            None => false,
        }
    }

    /// Reset to the root path
    pub fn reset(&mut self) {
        self.segments.truncate(1);
    }

    /// Full path of a child entry
    pub fn join(&self, name: &str) -> String {
        if self.is_root() {
            format!("/{}", name)
        } else {
            format!("{}/{}", self, name)
        }
    }

    /// Whether `name` can be a single path segment
    pub fn is_valid_segment(name: &str) -> bool {
        !matches!(name, "" | ROOT_SEGMENT | "." | "..") && !name.contains('/')
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "{}", ROOT_SEGMENT);
        }
        for segment in &self.segments[1..] {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}
