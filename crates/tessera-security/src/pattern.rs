// SPDX-FileCopyrightText: 2026 Tessera Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compiled path patterns for file capabilities.
//!
//! Patterns are globs where `*` stays within one path segment and `**`
//! spans segments:
//! - `/tmp/*.png` - PNG files directly under `/tmp`
//! - `/data/books/**` - anything below `/data/books`
//! - `/etc/hosts` - exactly that file

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// A set of compiled path patterns.
#[derive(Debug, Clone)]
pub struct PathPatterns {
    patterns: Vec<String>,
    set: GlobSet,
}

impl PathPatterns {
    /// Compile a list of patterns.
    ///
    /// Returns the offending pattern and reason on failure. Patterns that
    /// contain a `..` segment are rejected.
    pub fn compile(patterns: &[String]) -> Result<Self, String> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            if pattern.trim().is_empty() {
                return Err("empty path pattern".to_string());
            }
            if has_parent_segment(pattern) {
                return Err(format!("pattern '{pattern}' contains a '..' segment"));
            }
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| format!("pattern '{pattern}': {e}"))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| format!("cannot compile path patterns: {e}"))?;
        Ok(Self {
            patterns: patterns.to_vec(),
            set,
        })
    }

    /// Whether `path` matches any pattern. Paths with `..` segments never match.
    pub fn matches(&self, path: &str) -> bool {
        !has_parent_segment(path) && self.set.is_match(path)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Whether a path contains a `..` component under either separator.
pub fn has_parent_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == "..")
}
