//! Directory listing entries and presentation queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Base name
    pub name: String,
    /// Path of the entry on the remote device
    pub full_path: String,
    /// Size in bytes (0 for directories)
    pub byte_size: u64,
    /// Last modification time
    pub modified_at: DateTime<Utc>,
    /// Whether the entry is a directory
    pub is_directory: bool,
}

impl RemoteEntry {
    /// Create a file entry
    pub fn file(
        name: impl Into<String>,
        full_path: impl Into<String>,
        byte_size: u64,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            full_path: full_path.into(),
            byte_size,
            modified_at,
            is_directory: false,
        }
    }

    /// Create a directory entry
    pub fn directory(
        name: impl Into<String>,
        full_path: impl Into<String>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            full_path: full_path.into(),
            byte_size: 0,
            modified_at,
            is_directory: true,
        }
    }

    /// Extension of the name without the dot, if any
    pub fn extension(&self) -> Option<&str> {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Human readable size, `--` for directories
    pub fn formatted_size(&self) -> String {
        if self.is_directory {
            return "--".to_string();
        }
        format_size(self.byte_size)
    }
}

/// Render a byte count using decimal file-size units
///
/// ```rust
/// use cosmic_remote_protocol::navigator::format_size;
///
/// assert_eq!(format_size(1024), "1 KB");
/// assert_eq!(format_size(2 * 1024 * 1024), "2.1 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1_000.0;
    const MB: f64 = 1_000_000.0;
    const GB: f64 = 1_000_000_000.0;

    if bytes == 0 {
        return "Zero KB".to_string();
    }

    let value = bytes as f64;
    if value < MB {
        format!("{} KB", (value / KB).round().max(1.0))
    } else if value < GB {
        format!("{:.1} MB", value / MB)
    } else {
        format!("{:.2} GB", value / GB)
    }
}

/// Sort orders offered over a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NameAscending,
    NameDescending,
    DateAscending,
    DateDescending,
    SizeAscending,
    SizeDescending,
}

impl SortOrder {
    /// Every sort order
    pub const ALL: [SortOrder; 6] = [
        SortOrder::NameAscending,
        SortOrder::NameDescending,
        SortOrder::DateAscending,
        SortOrder::DateDescending,
        SortOrder::SizeAscending,
        SortOrder::SizeDescending,
    ];

    fn compare(self, a: &RemoteEntry, b: &RemoteEntry) -> Ordering {
        match self {
            SortOrder::NameAscending => compare_names(&a.name, &b.name),
            SortOrder::NameDescending => compare_names(&b.name, &a.name),
            SortOrder::DateAscending => a.modified_at.cmp(&b.modified_at),
            SortOrder::DateDescending => b.modified_at.cmp(&a.modified_at),
            SortOrder::SizeAscending => a.byte_size.cmp(&b.byte_size),
            SortOrder::SizeDescending => b.byte_size.cmp(&a.byte_size),
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "name" | "name-asc" => Ok(SortOrder::NameAscending),
            "name-desc" => Ok(SortOrder::NameDescending),
            "date" | "date-asc" => Ok(SortOrder::DateAscending),
            "date-desc" => Ok(SortOrder::DateDescending),
            "size" | "size-asc" => Ok(SortOrder::SizeAscending),
            "size-desc" => Ok(SortOrder::SizeDescending),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

// Case-insensitive first, then case-sensitive so the order is total
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Stateless filter and sort over a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingQuery {
    /// Case-insensitive substring the name must contain; empty matches all
    pub filter: String,
    /// Sort key and direction
    pub sort: SortOrder,
    /// Place directories before files
    pub directories_first: bool,
}

impl ListingQuery {
    /// Query with only a sort order
    pub fn sorted(sort: SortOrder) -> Self {
        Self {
            sort,
            ..Self::default()
        }
    }

    /// Set the name filter
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set directory-first ordering
    pub fn with_directories_first(mut self, directories_first: bool) -> Self {
        self.directories_first = directories_first;
        self
    }

    /// Whether `entry` passes the filter
    pub fn matches(&self, entry: &RemoteEntry) -> bool {
        let needle = self.filter.trim();
        needle.is_empty() || entry.name.to_lowercase().contains(&needle.to_lowercase())
    }

    /// Filtered and sorted copy of `entries`
    pub fn apply(&self, entries: &[RemoteEntry]) -> Vec<RemoteEntry> {
        let mut result: Vec<RemoteEntry> = entries
            .iter()
            .filter(|entry| self.matches(entry))
            .cloned()
            .collect();

        result.sort_by(|a, b| {
            let group = if self.directories_first {
                b.is_directory.cmp(&a.is_directory)
            } else {
                Ordering::Equal
            };
            group.then_with(|| self.sort.compare(a, b))
        });
        result
    }
}
