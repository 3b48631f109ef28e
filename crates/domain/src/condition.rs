//! Condition: a predicate over one transaction field.
//!
//! Every schedule carries a list of conditions that must all hold (logical
//! AND) for a transaction to match it. Each variant pairs a field with the
//! operators it supports, so a value can never have the wrong shape for its
//! operator. On the wire a condition is the `{op, field, value}` triple; field
//! names used by storage (`description`, `acct`) are translated when parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::id::{AccountId, PayeeId};
use crate::recurrence::DateSpec;
use crate::time::{Date, add_days};

/// Days of slack on either side of a date for `isapprox`.
pub const DATE_APPROX_DAYS: i64 = 2;

/// Transaction field a condition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Payee,
    Account,
    Amount,
    Date,
}

/// Storage and public field names, mapped to the field they denote.
const FIELD_NAMES: &[(&str, Field)] = &[
    ("payee", Field::Payee),
    ("description", Field::Payee),
    ("account", Field::Account),
    ("acct", Field::Account),
    ("amount", Field::Amount),
    ("date", Field::Date),
];

impl Field {
    /// Resolve a storage or public field name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownField`] for names outside the table.
    pub fn from_name(name: &str) -> Result<Self, ValidationError> {
        FIELD_NAMES
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, field)| *field)
            .ok_or_else(|| ValidationError::UnknownField(name.to_string()))
    }

    /// Public name of the field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Payee => "payee",
            Self::Account => "account",
            Self::Amount => "amount",
            Self::Date => "date",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "is")]
    Is,
    #[serde(rename = "isapprox")]
    IsApprox,
    #[serde(rename = "isbetween")]
    IsBetween,
    #[serde(rename = "oneOf")]
    OneOf,
}

impl Operator {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::IsApprox => "isapprox",
            Self::IsBetween => "isbetween",
            Self::OneOf => "oneOf",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier comparison, used for payees and accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdMatch<T> {
    Is(T),
    OneOf(Vec<T>),
}

impl<T: PartialEq> IdMatch<T> {
    /// Whether `value` satisfies the match. A missing value never does.
    #[must_use]
    pub fn contains(&self, value: Option<&T>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match self {
            Self::Is(expected) => expected == value,
            Self::OneOf(expected) => expected.contains(value),
        }
    }

    #[must_use]
    pub fn op(&self) -> Operator {
        match self {
            Self::Is(_) => Operator::Is,
            Self::OneOf(_) => Operator::OneOf,
        }
    }
}

/// Bounds of an `isbetween` amount condition, in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AmountRange {
    pub num1: i64,
    pub num2: i64,
}

impl AmountRange {
    #[must_use]
    pub fn new(num1: i64, num2: i64) -> Self {
        Self { num1, num2 }
    }

    /// `(low, high)` regardless of the order the bounds were given in.
    #[must_use]
    pub fn bounds(self) -> (i64, i64) {
        (self.num1.min(self.num2), self.num1.max(self.num2))
    }

    #[must_use]
    pub fn contains(self, amount: i64) -> bool {
        let (low, high) = self.bounds();
        (low..=high).contains(&amount)
    }

    /// Midpoint of the range, rounded half away from zero.
    #[must_use]
    pub fn average(self) -> i64 {
        let sum = i128::from(self.num1) + i128::from(self.num2);
        let half = if sum >= 0 { (sum + 1) / 2 } else { (sum - 1) / 2 };
        i64::try_from(half).unwrap_or(if sum >= 0 { i64::MAX } else { i64::MIN })
    }
}

/// Amount comparison, in minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountMatch {
    Is(i64),
    /// Within 7.5% of the value, rounded, boundary inclusive.
    IsApprox(i64),
    IsBetween(AmountRange),
    OneOf(Vec<i64>),
}

impl AmountMatch {
    #[must_use]
    pub fn contains(&self, amount: i64) -> bool {
        match self {
            Self::Is(expected) => *expected == amount,
            Self::IsApprox(expected) => amount.abs_diff(*expected) <= approx_threshold(*expected),
            Self::IsBetween(range) => range.contains(amount),
            Self::OneOf(expected) => expected.contains(&amount),
        }
    }

    #[must_use]
    pub fn op(&self) -> Operator {
        match self {
            Self::Is(_) => Operator::Is,
            Self::IsApprox(_) => Operator::IsApprox,
            Self::IsBetween(_) => Operator::IsBetween,
            Self::OneOf(_) => Operator::OneOf,
        }
    }
}

/// Largest distance from `amount` an `isapprox` match tolerates: 7.5% of its
/// magnitude, rounded half up.
#[must_use]
pub fn approx_threshold(amount: i64) -> u64 {
    amount
        .unsigned_abs()
        .saturating_mul(75)
        .saturating_add(500)
        / 1000
}

/// Date comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateMatch {
    /// Exactly the date, or an occurrence of the rule on that date.
    Is(DateSpec),
    /// Within [`DATE_APPROX_DAYS`] of the date or of an occurrence of the rule.
    IsApprox(DateSpec),
    OneOf(Vec<Date>),
}

impl DateMatch {
    /// Whether `date` satisfies the match. A malformed rule matches nothing.
    #[must_use]
    pub fn contains(&self, date: Date) -> bool {
        match self {
            Self::Is(spec) => spec.occurs_between(date, date).unwrap_or(false),
            Self::IsApprox(spec) => spec
                .occurs_between(
                    add_days(date, -DATE_APPROX_DAYS),
                    add_days(date, DATE_APPROX_DAYS),
                )
                .unwrap_or(false),
            Self::OneOf(dates) => dates.contains(&date),
        }
    }

    /// The date spec of an `is`/`isapprox` match.
    #[must_use]
    pub fn spec(&self) -> Option<&DateSpec> {
        match self {
            Self::Is(spec) | Self::IsApprox(spec) => Some(spec),
            Self::OneOf(_) => None,
        }
    }

    #[must_use]
    pub fn op(&self) -> Operator {
        match self {
            Self::Is(_) => Operator::Is,
            Self::IsApprox(_) => Operator::IsApprox,
            Self::OneOf(_) => Operator::OneOf,
        }
    }
}

/// A predicate over one transaction field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub enum Condition {
    Payee(IdMatch<PayeeId>),
    Account(IdMatch<AccountId>),
    Amount(AmountMatch),
    Date(DateMatch),
}

impl Condition {
    #[must_use]
    pub fn field(&self) -> Field {
        match self {
            Self::Payee(_) => Field::Payee,
            Self::Account(_) => Field::Account,
            Self::Amount(_) => Field::Amount,
            Self::Date(_) => Field::Date,
        }
    }

    #[must_use]
    pub fn op(&self) -> Operator {
        match self {
            Self::Payee(m) => m.op(),
            Self::Account(m) => m.op(),
            Self::Amount(m) => m.op(),
            Self::Date(m) => m.op(),
        }
    }

    /// Build a condition from its wire parts.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the field is unknown, the operator
    /// is not supported for the field, or the value has the wrong shape.
    pub fn parse(field: &str, op: Operator, value: Value) -> Result<Self, ValidationError> {
        let field = Field::from_name(field)?;
        let condition = match (field, op) {
            (Field::Payee, Operator::Is) => Self::Payee(IdMatch::Is(parse_value(field, value)?)),
            (Field::Payee, Operator::OneOf) => {
                Self::Payee(IdMatch::OneOf(parse_value(field, value)?))
            }
            (Field::Account, Operator::Is) => {
                Self::Account(IdMatch::Is(parse_value(field, value)?))
            }
            (Field::Account, Operator::OneOf) => {
                Self::Account(IdMatch::OneOf(parse_value(field, value)?))
            }
            (Field::Amount, Operator::Is) => Self::Amount(AmountMatch::Is(parse_value(field, value)?)),
            (Field::Amount, Operator::IsApprox) => {
                Self::Amount(AmountMatch::IsApprox(parse_value(field, value)?))
            }
            (Field::Amount, Operator::IsBetween) => {
                Self::Amount(AmountMatch::IsBetween(parse_value(field, value)?))
            }
            (Field::Amount, Operator::OneOf) => {
                Self::Amount(AmountMatch::OneOf(parse_value(field, value)?))
            }
            (Field::Date, Operator::Is) => Self::Date(DateMatch::Is(parse_value(field, value)?)),
            (Field::Date, Operator::IsApprox) => {
                Self::Date(DateMatch::IsApprox(parse_value(field, value)?))
            }
            (Field::Date, Operator::OneOf) => {
                Self::Date(DateMatch::OneOf(parse_value(field, value)?))
            }
            (field, op) => {
                return Err(ValidationError::InvalidCondition {
                    field: field.to_string(),
                    op: op.to_string(),
                });
            }
        };
        if let Self::Date(date) = &condition {
            if let Some(spec) = date.spec() {
                spec.validate().map_err(|err| ValidationError::InvalidValue {
                    field: field.to_string(),
                    reason: err.to_string(),
                })?;
            }
        }
        Ok(condition)
    }

    /// Wire value of the condition.
    #[must_use]
    pub fn value(&self) -> Value {
        match self {
            Self::Payee(m) => id_value(m),
            Self::Account(m) => id_value(m),
            Self::Amount(AmountMatch::Is(n) | AmountMatch::IsApprox(n)) => Value::from(*n),
            Self::Amount(AmountMatch::IsBetween(range)) => {
                serde_json::json!({ "num1": range.num1, "num2": range.num2 })
            }
            Self::Amount(AmountMatch::OneOf(ns)) => Value::from(ns.clone()),
            Self::Date(DateMatch::Is(spec) | DateMatch::IsApprox(spec)) => {
                serde_json::to_value(spec).unwrap_or_default()
            }
            Self::Date(DateMatch::OneOf(dates)) => Value::Array(
                dates
                    .iter()
                    .map(|date| Value::String(crate::time::format_date(*date)))
                    .collect(),
            ),
        }
    }
}

fn parse_value<T: serde::de::DeserializeOwned>(
    field: Field,
    value: Value,
) -> Result<T, ValidationError> {
    serde_json::from_value(value).map_err(|err| ValidationError::InvalidValue {
        field: field.to_string(),
        reason: err.to_string(),
    })
}

fn id_value<T: std::fmt::Display>(m: &IdMatch<T>) -> Value {
    match m {
        IdMatch::Is(id) => Value::String(id.to_string()),
        IdMatch::OneOf(ids) => Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect()),
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field(), self.op(), self.value())
    }
}

/// Wire shape of a [`Condition`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCondition {
    pub op: Operator,
    pub field: String,
    pub value: Value,
}

impl TryFrom<RawCondition> for Condition {
    type Error = ValidationError;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        Self::parse(&raw.field, raw.op, raw.value)
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        Self {
            op: condition.op(),
            field: condition.field().to_string(),
            value: condition.value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::RecurConfig;

    fn date(y: i32, m: u32, d: u32) -> Date {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn should_match_approx_amount_within_tolerance() {
        let m = AmountMatch::IsApprox(1000);
        assert!(m.contains(1050));
        assert!(!m.contains(1300));
    }

    #[test]
    fn should_include_approx_amount_boundary() {
        let m = AmountMatch::IsApprox(1000);
        assert!(m.contains(925));
        assert!(m.contains(1075));
        assert!(!m.contains(1076));
        assert!(!m.contains(924));
    }

    #[test]
    fn should_match_negative_approx_amounts() {
        let m = AmountMatch::IsApprox(-1000);
        assert!(m.contains(-1075));
        assert!(!m.contains(1000));
    }

    #[test]
    fn should_match_isbetween_in_either_order() {
        let forward = AmountMatch::IsBetween(AmountRange::new(50, 100));
        let reversed = AmountMatch::IsBetween(AmountRange::new(100, 50));
        for amount in [49, 50, 75, 100, 101] {
            assert_eq!(forward.contains(amount), reversed.contains(amount));
        }
        assert!(reversed.contains(50));
        assert!(!reversed.contains(101));
    }

    #[test]
    fn should_round_range_average_half_away_from_zero() {
        assert_eq!(AmountRange::new(100, 201).average(), 151);
        assert_eq!(AmountRange::new(-100, -201).average(), -151);
        assert_eq!(AmountRange::new(100, 200).average(), 150);
    }

    #[test]
    fn should_match_approx_date_within_two_days() {
        let m = DateMatch::IsApprox(DateSpec::Date(date(2024, 3, 10)));
        assert!(m.contains(date(2024, 3, 8)));
        assert!(m.contains(date(2024, 3, 12)));
        assert!(!m.contains(date(2024, 3, 13)));
    }

    #[test]
    fn should_match_approx_date_against_recurring_rule() {
        let m = DateMatch::IsApprox(DateSpec::Recurring(RecurConfig::monthly(date(2024, 1, 15))));
        assert!(m.contains(date(2024, 4, 17)));
        assert!(!m.contains(date(2024, 4, 18)));
        assert!(!m.contains(date(2024, 1, 12)));
    }

    #[test]
    fn should_match_exact_date_only_on_occurrence() {
        let m = DateMatch::Is(DateSpec::Recurring(RecurConfig::monthly(date(2024, 1, 15))));
        assert!(m.contains(date(2024, 2, 15)));
        assert!(!m.contains(date(2024, 2, 16)));
    }

    #[test]
    fn should_never_match_missing_payee() {
        let m = IdMatch::Is(PayeeId::new());
        assert!(!m.contains(None));
    }

    #[test]
    fn should_translate_storage_field_names() {
        assert_eq!(Field::from_name("description"), Ok(Field::Payee));
        assert_eq!(Field::from_name("acct"), Ok(Field::Account));
        assert!(matches!(
            Field::from_name("notes"),
            Err(ValidationError::UnknownField(name)) if name == "notes"
        ));
    }

    #[test]
    fn should_parse_condition_from_storage_field_name() {
        let payee = PayeeId::new();
        let json = serde_json::json!({ "op": "is", "field": "description", "value": payee });
        let condition: Condition = serde_json::from_value(json).unwrap();
        assert_eq!(condition, Condition::Payee(IdMatch::Is(payee)));
    }

    #[test]
    fn should_reject_unsupported_operator_for_field() {
        let err = Condition::parse("payee", Operator::IsBetween, serde_json::json!(1)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCondition { .. }));
    }

    #[test]
    fn should_reject_value_of_wrong_shape() {
        let err = Condition::parse("amount", Operator::IsBetween, serde_json::json!(5)).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { field, .. } if field == "amount"));
    }

    #[test]
    fn should_reject_malformed_recurrence_in_date_condition() {
        let value = serde_json::json!({ "start": "2024-01-01", "frequency": "monthly", "interval": 0 });
        let err = Condition::parse("date", Operator::IsApprox, value).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { .. }));
    }

    #[test]
    fn should_roundtrip_conditions_through_serde_json() {
        let conditions = vec![
            Condition::Payee(IdMatch::Is(PayeeId::new())),
            Condition::Account(IdMatch::OneOf(vec![AccountId::new(), AccountId::new()])),
            Condition::Amount(AmountMatch::IsBetween(AmountRange::new(-500, -300))),
            Condition::Date(DateMatch::IsApprox(DateSpec::Recurring(RecurConfig::monthly(
                date(2024, 1, 31),
            )))),
            Condition::Date(DateMatch::OneOf(vec![date(2024, 5, 1)])),
        ];
        for condition in &conditions {
            let json = serde_json::to_string(condition).unwrap();
            let parsed: Condition = serde_json::from_str(&json).unwrap();
            assert_eq!(&parsed, condition);
        }
    }

    #[test]
    fn should_display_condition_as_triple() {
        let condition = Condition::Amount(AmountMatch::IsApprox(1000));
        assert_eq!(condition.to_string(), "amount isapprox 1000");
    }
}
