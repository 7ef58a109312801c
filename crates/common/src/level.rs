// Negotiated protocol generation of a version-control endpoint.

use serde::{Deserialize, Serialize};

/// Protocol generations, oldest first. Ordering is the gate: a feature that
/// needs `Tfs2012Update2` is available whenever `current >= Tfs2012Update2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceLevel {
    PreTfs2010,
    Tfs2010,
    Tfs2012,
    Tfs2012Update1,
    Tfs2012Update2,
    Tfs2012Update3,
    Tfs2012Qu1,
    Tfs2012Qu1Update1,
}

impl ServiceLevel {
    pub const ALL: [ServiceLevel; 8] = [
        Self::PreTfs2010,
        Self::Tfs2010,
        Self::Tfs2012,
        Self::Tfs2012Update1,
        Self::Tfs2012Update2,
        Self::Tfs2012Update3,
        Self::Tfs2012Qu1,
        Self::Tfs2012Qu1Update1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreTfs2010 => "pre-2010",
            Self::Tfs2010 => "2010",
            Self::Tfs2012 => "2012",
            Self::Tfs2012Update1 => "2012.1",
            Self::Tfs2012Update2 => "2012.2",
            Self::Tfs2012Update3 => "2012.3",
            Self::Tfs2012Qu1 => "2012-qu1",
            Self::Tfs2012Qu1Update1 => "2012-qu1.1",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == s)
    }

    /// Monotonic numeric value, useful for logging and persisted caches.
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for ServiceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_oldest_first() {
        let mut sorted = ServiceLevel::ALL;
        sorted.sort();
        assert_eq!(sorted, ServiceLevel::ALL);
        assert!(ServiceLevel::Tfs2012Qu1 > ServiceLevel::Tfs2012Update3);
        assert!(ServiceLevel::PreTfs2010 < ServiceLevel::Tfs2010);
    }

    #[test]
    fn as_str_parse_roundtrip() {
        for level in ServiceLevel::ALL {
            assert_eq!(ServiceLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(ServiceLevel::parse("2015"), None);
    }

    #[test]
    fn value_tracks_ordering() {
        assert_eq!(ServiceLevel::PreTfs2010.value(), 0);
        assert_eq!(ServiceLevel::Tfs2012Qu1Update1.value(), 7);
    }
}
