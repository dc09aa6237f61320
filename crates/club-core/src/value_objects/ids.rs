//! Typed identifiers
//!
//! Every id in the messaging domain is a server-assigned 64-bit integer. Each kind
//! gets its own newtype so an account id can never be passed where a channel id
//! is expected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Error when parsing an id from its string form
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("invalid id format")]
    InvalidFormat,
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $expecting:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(i64);

        impl $name {
            /// Wrap a raw id
            #[inline]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the inner i64 value
            #[inline]
            pub const fn into_inner(self) -> i64 {
                self.0
            }

            /// Parse from string representation
            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| IdParseError::InvalidFormat)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_i64(self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserializer.deserialize_any(IdVisitor($expecting)).map(Self)
            }
        }
    };
}

/// Accepts either a JSON number or a numeric string
struct IdVisitor(&'static str);

impl serde::de::Visitor<'_> for IdVisitor {
    type Value = i64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.0)
    }

    fn visit_i64<E>(self, value: i64) -> Result<i64, E>
    where
        E: serde::de::Error,
    {
        Ok(value)
    }

    fn visit_u64<E>(self, value: u64) -> Result<i64, E>
    where
        E: serde::de::Error,
    {
        i64::try_from(value).map_err(|_| E::custom("id out of range"))
    }

    fn visit_str<E>(self, value: &str) -> Result<i64, E>
    where
        E: serde::de::Error,
    {
        value.trim().parse::<i64>().map_err(E::custom)
    }
}

define_id!(
    /// Club account (the person viewing or sending)
    AccountId,
    "an account id as integer or string"
);

define_id!(
    /// Messaging channel
    ChannelId,
    "a channel id as integer or string"
);

define_id!(
    /// Message id; monotonic per channel and never reused
    MessageId,
    "a message id as integer or string"
);

define_id!(
    /// Channel deletion proposal
    DeleteRequestId,
    "a delete request id as integer or string"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let id = AccountId::parse("42").unwrap();
        assert_eq!(id, AccountId::new(42));
        assert_eq!(id.to_string(), "42");
        assert_eq!(
            ChannelId::parse("abc"),
            Err(IdParseError::InvalidFormat)
        );
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_string(&MessageId::new(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn test_deserializes_from_number_or_string() {
        let from_number: ChannelId = serde_json::from_str("12").unwrap();
        let from_string: ChannelId = serde_json::from_str("\"12\"").unwrap();
        assert_eq!(from_number, from_string);
        assert!(serde_json::from_str::<ChannelId>("\"twelve\"").is_err());
    }

    #[test]
    fn test_ordering_follows_raw_value() {
        assert!(MessageId::new(1) < MessageId::new(2));
    }
}
