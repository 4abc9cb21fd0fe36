//! Trusted origin registry
//!
//! Built once from the `ALLOWED_ORIGINS` configuration value at startup and
//! shared read-only across all workers. Matching is exact: no wildcards, no
//! subdomain or scheme normalization.

/// Ordered set of trusted origin strings.
///
/// An empty registry denies every origin. This is the fail-closed default
/// when `ALLOWED_ORIGINS` is absent or blank.
#[derive(Debug, Clone, Default)]
pub struct OriginRegistry {
    origins: Vec<String>,
}

impl OriginRegistry {
    /// Parse a comma-separated origin list. Entries are trimmed and empty
    /// entries dropped, so `"a.com, ,b.com,"` yields two origins.
    pub fn parse(raw: &str) -> Self {
        let origins = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Self { origins }
    }

    /// Exact, case-sensitive membership test.
    pub fn contains(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    /// Registered origins in configuration order.
    pub fn origins(&self) -> &[String] {
        &self.origins
    }
}
