//! Numeric and GUID identities.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Numeric identity of a media item as assigned by the authoring tool.
pub type MediaId = u32;

/// Numeric short id of an event, bus, game sync or group value.
pub type ShortId = u32;

/// A GUID in the authoring tool's `{XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX}` form.
///
/// Parsing is strict: braces and hyphens are required. Display always emits
/// the braced, upper-case form so round-tripping through JSON is stable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Guid(Uuid);

impl Guid {
    /// The all-zero GUID.
    pub const NIL: Guid = Guid(Uuid::nil());

    /// Parse a braced, hyphenated GUID string.
    pub fn parse_braced(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| Error::InvalidGuid(s.to_string()))?;

        // 8-4-4-4-12 digits with hyphens
        if inner.len() != 36 || inner.matches('-').count() != 4 {
            return Err(Error::InvalidGuid(s.to_string()));
        }

        Uuid::parse_str(inner)
            .map(Guid)
            .map_err(|_| Error::InvalidGuid(s.to_string()))
    }

    /// Build a GUID from its 128-bit value.
    pub const fn from_u128(value: u128) -> Self {
        Guid(Uuid::from_u128(value))
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hyphenated = self.0.hyphenated().to_string().to_ascii_uppercase();
        write!(f, "{{{}}}", hyphenated)
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self)
    }
}

impl FromStr for Guid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Guid::parse_braced(s)
    }
}

impl TryFrom<String> for Guid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Guid::parse_braced(&value)
    }
}

impl From<Guid> for String {
    fn from(value: Guid) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_braced() {
        let guid = Guid::parse_braced("{1A2B3C4D-0000-1111-2222-333344445555}").unwrap();
        assert_eq!(guid.to_string(), "{1A2B3C4D-0000-1111-2222-333344445555}");
    }

    #[test]
    fn test_parse_lowercase_normalizes() {
        let guid = Guid::parse_braced("{1a2b3c4d-0000-1111-2222-333344445555}").unwrap();
        assert_eq!(guid.to_string(), "{1A2B3C4D-0000-1111-2222-333344445555}");
    }

    #[test]
    fn test_parse_requires_braces() {
        assert!(Guid::parse_braced("1A2B3C4D-0000-1111-2222-333344445555").is_err());
        assert!(Guid::parse_braced("{1A2B3C4D000011112222333344445555}").is_err());
        assert!(Guid::parse_braced("").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let guid = Guid::from_u128(0x11111111_2222_3333_4444_555555555555);
        let json = serde_json::to_string(&guid).unwrap();
        assert_eq!(json, "\"{11111111-2222-3333-4444-555555555555}\"");

        let back: Guid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, guid);
    }

    #[test]
    fn test_nil() {
        assert!(Guid::NIL.is_nil());
        assert!(!Guid::from_u128(1).is_nil());
    }
}
