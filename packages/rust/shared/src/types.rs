//! Core domain types shared across fleetsql crates.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// Origin of a document node: the file it was read from and its 1-based
/// line and column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Path of the source file, as it was opened.
    pub file: String,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

// ---------------------------------------------------------------------------
// Build statistics
// ---------------------------------------------------------------------------

/// Row counts for a single package written to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageStats {
    pub data_streams: usize,
    pub pipelines: usize,
    pub processors: usize,
    pub fields: usize,
    pub vars: usize,
    pub transforms: usize,
}

impl PackageStats {
    /// Add another package's counts into this one.
    pub fn merge(&mut self, other: &PackageStats) {
        self.data_streams += other.data_streams;
        self.pipelines += other.pipelines;
        self.processors += other.processors;
        self.fields += other.fields;
        self.vars += other.vars;
        self.transforms += other.transforms;
    }
}

/// Summary of a completed store build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSummary {
    /// Number of packages written.
    pub packages: usize,
    /// Aggregated row counts over all packages.
    pub totals: PackageStats,
    /// Wall-clock time of the build.
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_display() {
        let loc = Location::new("packages/nginx/manifest.yml", 3, 7);
        assert_eq!(loc.to_string(), "packages/nginx/manifest.yml:3:7");
    }

    #[test]
    fn stats_merge_accumulates() {
        let mut total = PackageStats::default();
        total.merge(&PackageStats {
            data_streams: 2,
            pipelines: 3,
            processors: 10,
            fields: 40,
            vars: 5,
            transforms: 0,
        });
        total.merge(&PackageStats {
            data_streams: 1,
            processors: 4,
            ..Default::default()
        });
        assert_eq!(total.data_streams, 3);
        assert_eq!(total.processors, 14);
        assert_eq!(total.fields, 40);
    }

    #[test]
    fn summary_serializes() {
        let summary = BuildSummary {
            packages: 2,
            ..Default::default()
        };
        let json = serde_json::to_string(&summary).expect("serialize");
        let parsed: BuildSummary = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.packages, 2);
    }
}
