//! Typed identifier newtypes backed by UUIDs.
//!
//! Ids serialize as their hyphenated string form, which is also how the
//! storage adapter keeps them and how conditions carry them in JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a [`Schedule`](crate::schedule::Schedule).
    ScheduleId
);

define_id!(
    /// Unique identifier for a [`Transaction`](crate::transaction::Transaction).
    TransactionId
);

define_id!(
    /// Payee a [`Transaction`](crate::transaction::Transaction) is made to.
    ///
    /// Matched by [`Condition::Payee`](crate::condition::Condition::Payee) and
    /// copied onto posted transactions by
    /// [`Schedule::posting_payee`](crate::schedule::Schedule::posting_payee).
    PayeeId
);

define_id!(
    /// Account a [`Transaction`](crate::transaction::Transaction) belongs to.
    ///
    /// Matched by [`Condition::Account`](crate::condition::Condition::Account);
    /// a schedule posts only into a single
    /// [`posting_account`](crate::schedule::Schedule::posting_account).
    AccountId
);

define_id!(
    /// General rule backing a schedule, see [`Schedule::rule`](crate::schedule::Schedule::rule).
    RuleId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        let a = ScheduleId::new();
        let b = ScheduleId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = TransactionId::new();
        let text = id.to_string();
        let parsed: TransactionId = text.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let id = PayeeId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: PayeeId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_return_error_when_parsing_invalid_uuid() {
        let result = AccountId::from_str("not-a-uuid");
        assert!(result.is_err());
    }

    #[test]
    fn should_serialize_as_plain_string() {
        let id = RuleId::new();
        let value = serde_json::to_value(id).unwrap();
        assert_eq!(value, serde_json::Value::String(id.to_string()));
    }
}
