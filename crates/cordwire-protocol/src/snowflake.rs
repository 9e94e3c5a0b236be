//! The gateway's 64-bit identifier.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A unique id for a user, channel, guild, message, and so on.
///
/// The gateway sends ids as JSON strings (they overflow JavaScript
/// numbers), but configuration files and tests often use bare integers.
/// Both forms deserialize; serialization always produces a string.
///
/// `Snowflake::default()` (zero) never names a real object and stands in
/// for "absent" on fields the gateway sometimes omits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snowflake(pub u64);

impl Snowflake {
    /// Returns the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// `true` for the zero placeholder.
    pub fn is_unset(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Snowflake {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnowflakeVisitor;

        impl Visitor<'_> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a snowflake id as a string or unsigned integer")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Snowflake, E> {
                Ok(Snowflake(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Snowflake, E> {
                u64::try_from(v)
                    .map(Snowflake)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Snowflake, E> {
                v.parse()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_from_string_and_integer() {
        let a: Snowflake = serde_json::from_str(r#""175928847299117063""#).unwrap();
        let b: Snowflake = serde_json::from_str("175928847299117063").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.get(), 175_928_847_299_117_063);
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Snowflake(42)).unwrap();
        assert_eq!(json, r#""42""#);
    }

    #[test]
    fn test_rejects_negative_and_non_numeric() {
        assert!(serde_json::from_str::<Snowflake>("-5").is_err());
        assert!(serde_json::from_str::<Snowflake>(r#""abc""#).is_err());
    }

    #[test]
    fn test_from_str_trims_whitespace() {
        assert_eq!(" 99 ".parse::<Snowflake>().unwrap(), Snowflake(99));
    }

    #[test]
    fn test_default_is_unset() {
        assert!(Snowflake::default().is_unset());
        assert!(!Snowflake(1).is_unset());
    }
}
