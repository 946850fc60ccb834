//! Product version strings.
//!
//! Pingnoo versions follow a `<date>-<build>` convention such as
//! `2021.03.15-R3`. Each packaging format wants a different slice of it.

use crate::error::VersionError;
use std::{fmt, str::FromStr};

/// A `--version` string with accessors for the per-format version fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductVersion {
    raw: String,
}

impl ProductVersion {
    /// Validate and wrap a version string.
    pub fn parse(version: &str) -> Result<Self, VersionError> {
        let version = version.trim();
        if version.is_empty() {
            return Err(VersionError::InvalidVersion {
                version: version.to_string(),
                reason: "version must not be empty".to_string(),
            });
        }
        if version.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
            return Err(VersionError::InvalidVersion {
                version: version.to_string(),
                reason: "version must not contain whitespace or quotes".to_string(),
            });
        }
        Ok(Self {
            raw: version.to_string(),
        })
    }

    /// The full version string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Everything before the first `-` (the whole string if there is none).
    pub fn date(&self) -> &str {
        self.raw.split_once('-').map_or(self.raw.as_str(), |(date, _)| date)
    }

    /// Everything after the first `-`.
    pub fn build(&self) -> Option<&str> {
        self.raw.split_once('-').map(|(_, build)| build)
    }

    /// Version field for the Windows installer.
    ///
    /// The date part with its two character century prefix removed
    /// (`2021.03.15-R3` becomes `21.03.15`), or `0.0.0` when the string has no
    /// build part.
    pub fn installer_version(&self) -> String {
        match self.raw.split_once('-') {
            Some((date, _)) => date.chars().skip(2).collect(),
            None => "0.0.0".to_string(),
        }
    }

    /// Version field for RPM, which forbids `-`.
    pub fn rpm_version(&self) -> &str {
        self.date()
    }
}

impl FromStr for ProductVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ProductVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_date_and_build() {
        let version = ProductVersion::parse("2021.03.15-R3").unwrap();
        assert_eq!(version.date(), "2021.03.15");
        assert_eq!(version.build(), Some("R3"));
        assert_eq!(version.installer_version(), "21.03.15");
        assert_eq!(version.rpm_version(), "2021.03.15");
    }

    #[test]
    fn short_version_keeps_build_field() {
        let version = ProductVersion::parse("2021-R3").unwrap();
        assert_eq!(version.build(), Some("R3"));
        assert_eq!(version.installer_version(), "21");
    }

    #[test]
    fn installer_version_defaults_without_build() {
        let version = ProductVersion::parse("2021.10.01").unwrap();
        assert_eq!(version.installer_version(), "0.0.0");
        assert_eq!(version.build(), None);
        assert_eq!(version.rpm_version(), "2021.10.01");
    }

    #[test]
    fn only_first_dash_splits() {
        let version: ProductVersion = "2021.03.15-R3-beta".parse().unwrap();
        assert_eq!(version.build(), Some("R3-beta"));
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(ProductVersion::parse("  ").is_err());
        assert!(ProductVersion::parse("2021 R3").is_err());
    }
}
