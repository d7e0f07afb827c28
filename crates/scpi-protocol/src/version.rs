//! SCPI standard version (`SYST:VERS?`)

use std::fmt;
use std::str::FromStr;

/// `<year>.<approved>` as reported by the instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub year: i32,
    pub approved: i32,
}

impl Version {
    /// Sentinel for an unset or unparsable version
    pub const INVALID: Version = Version {
        year: -1,
        approved: -1,
    };

    pub fn new(year: i32, approved: i32) -> Self {
        Self { year, approved }
    }

    pub fn is_valid(&self) -> bool {
        self.year > 0 && self.approved >= 0
    }

    /// Like [`str::parse`] but malformed input gives [`Version::INVALID`]
    pub fn parse_lossy(s: &str) -> Version {
        s.parse().unwrap_or(Version::INVALID)
    }
}

/// Parses `<year>.<approved>`, surrounding whitespace allowed
impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("Invalid version: {}", s.trim());
        let (year, approved) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Version {
            year: year.trim().parse().map_err(|_| invalid())?,
            approved: approved.trim().parse().map_err(|_| invalid())?,
        })
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::INVALID
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.year, self.approved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("2004.1".parse::<Version>(), Ok(Version::new(2004, 1)));
        assert_eq!(" 1999.0 ".parse::<Version>(), Ok(Version::new(1999, 0)));
        assert!(Version::new(2004, 1).is_valid());
        assert_eq!("SCPI".parse::<Version>(), Err("Invalid version: SCPI".to_string()));
    }

    #[test]
    fn test_malformed_is_invalid() {
        for s in ["garbage", "", "2004", "2004.", ".1", "2004.1.2", "a.b"] {
            let version = Version::parse_lossy(s);
            assert_eq!(version, Version::INVALID, "{:?}", s);
            assert!(!version.is_valid());
        }
    }

    #[test]
    fn test_zero_year_is_invalid() {
        assert!(!Version::parse_lossy("0.1").is_valid());
    }

    #[test]
    fn test_display() {
        assert_eq!(Version::new(1999, 0).to_string(), "1999.0");
    }
}
