//! Member selection using glob patterns

use glob::{MatchOptions, Pattern};
use imgtool_core::MemberFilter;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A single glob pattern matched against member names
#[derive(Debug, Clone)]
pub struct GlobFilter {
    source: String,
    pattern: Pattern,
}

impl GlobFilter {
    /// Compile a pattern such as `*.dff` or `car?.txd`
    pub fn new(source: &str) -> anyhow::Result<Self> {
        let pattern = Pattern::new(source)
            .map_err(|e| anyhow::anyhow!("Invalid glob pattern '{}': {}", source, e))?;
        Ok(Self {
            source: source.to_string(),
            pattern,
        })
    }

    /// Compile every pattern, failing on the first invalid one
    pub fn compile_all(sources: &[String]) -> anyhow::Result<Vec<Self>> {
        sources.iter().map(|s| Self::new(s)).collect()
    }
}

impl MemberFilter for GlobFilter {
    fn matches(&self, name: &str) -> bool {
        self.pattern.matches_with(name, MATCH_OPTIONS)
    }

    fn describe(&self) -> String {
        self.source.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        let filter = GlobFilter::new("*.txd").unwrap();
        assert!(filter.matches("textures.txd"));
        assert!(!filter.matches("car.dff"));

        let filter = GlobFilter::new("car?.dff").unwrap();
        assert!(filter.matches("car1.dff"));
        assert!(!filter.matches("car10.dff"));
    }

    #[test]
    fn test_literal_name() {
        let filter = GlobFilter::new("old_car.dff").unwrap();
        assert!(filter.matches("old_car.dff"));
        assert!(!filter.matches("old_car.dff.bak"));
        assert_eq!(filter.describe(), "old_car.dff");
    }

    #[test]
    fn test_case_sensitive() {
        let filter = GlobFilter::new("*.DFF").unwrap();
        assert!(!filter.matches("car.dff"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(GlobFilter::new("[unclosed").is_err());
        assert!(GlobFilter::compile_all(&["*.dff".to_string(), "[".to_string()]).is_err());
    }
}
