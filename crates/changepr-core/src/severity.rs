//! Bump severity scale.
//!
//! Severities are totally ordered `dep < patch < minor < major`, so the
//! derived `Ord` can be used directly to fold a running maximum.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How much a release bumps a package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    /// Dependency-only update (no own changes).
    #[default]
    #[serde(alias = "none")]
    Dep,
    /// Backwards compatible fix.
    Patch,
    /// Backwards compatible feature.
    Minor,
    /// Breaking change.
    Major,
}

impl BumpLevel {
    /// Numeric rank on the `0..=3` scale.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Dep => 0,
            Self::Patch => 1,
            Self::Minor => 2,
            Self::Major => 3,
        }
    }

    /// Map a lowercase severity keyword to its level.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "major" => Some(Self::Major),
            "minor" => Some(Self::Minor),
            "patch" => Some(Self::Patch),
            _ => None,
        }
    }

    /// Classify free text by the leftmost severity keyword it mentions.
    ///
    /// Matching is case-insensitive and substring based, so "Minor Changes"
    /// and "majorly" both count. Returns `None` when no keyword occurs.
    pub fn classify(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        ["major", "minor", "patch"]
            .iter()
            .filter_map(|keyword| lower.find(keyword).map(|pos| (pos, *keyword)))
            .min_by_key(|(pos, _)| *pos)
            .and_then(|(_, keyword)| Self::from_keyword(keyword))
    }
}

impl fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dep => write!(f, "dep"),
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}
