//! Typed proposition values and value constraints

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Comparator attached to an inequality value such as `< 5`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InequalityComparator {
    /// Strictly less than the number
    LessThan,
    /// Less than or equal to the number
    LessThanOrEqual,
    /// Strictly greater than the number
    GreaterThan,
    /// Greater than or equal to the number
    GreaterThanOrEqual,
}

/// Value carried by a primitive parameter or an abstraction instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// A plain number
    Number(f64),

    /// A censored number such as a lab result reported as `< 5`
    Inequality {
        /// Direction of the censoring
        comparator: InequalityComparator,
        /// The reported limit
        number: f64,
    },

    /// A categorical value
    Nominal(String),

    /// A truth value
    Boolean(bool),

    /// An absolute instant in epoch milliseconds
    Date(i64),

    /// A list of values
    List(Vec<Value>),
}

/// Coarse value type used to check that sources of a definition agree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Numbers and inequalities
    Numerical,
    /// Categorical values
    Nominal,
    /// Truth values
    Boolean,
    /// Instants
    Date,
    /// Lists
    List,
}

impl Value {
    /// The coarse type of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Number(_) | Value::Inequality { .. } => ValueType::Numerical,
            Value::Nominal(_) => ValueType::Nominal,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Date(_) => ValueType::Date,
            Value::List(_) => ValueType::List,
        }
    }

    /// The number for plain numeric values
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Compare two values when the comparison is determinate
    ///
    /// Inequalities only compare when the answer does not depend on the
    /// censored part: `< 5` is less than `7` but incomparable with `3`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Inequality { comparator, number }, Value::Number(b)) => {
                compare_inequality(*comparator, *number, *b)
            }
            (Value::Number(_), Value::Inequality { .. }) => other.compare(self).map(Ordering::reverse),
            (Value::Nominal(a), Value::Nominal(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }
}

fn compare_inequality(comparator: InequalityComparator, limit: f64, number: f64) -> Option<Ordering> {
    match comparator {
        InequalityComparator::LessThan if limit <= number => Some(Ordering::Less),
        InequalityComparator::LessThanOrEqual if limit < number => Some(Ordering::Less),
        InequalityComparator::GreaterThan if limit >= number => Some(Ordering::Greater),
        InequalityComparator::GreaterThanOrEqual if limit > number => Some(Ordering::Greater),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Inequality { comparator, number } => {
                let symbol = match comparator {
                    InequalityComparator::LessThan => "<",
                    InequalityComparator::LessThanOrEqual => "<=",
                    InequalityComparator::GreaterThan => ">",
                    InequalityComparator::GreaterThanOrEqual => ">=",
                };
                write!(f, "{} {}", symbol, number)
            }
            Value::Nominal(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "@{}", d),
            Value::List(values) => {
                let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Nominal(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Comparison used by value constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueComparator {
    /// Equal to the constraint value
    Equal,
    /// Not equal to the constraint value
    NotEqual,
    /// Less than the constraint value
    LessThan,
    /// Less than or equal to the constraint value
    LessThanOrEqual,
    /// Greater than the constraint value
    GreaterThan,
    /// Greater than or equal to the constraint value
    GreaterThanOrEqual,
    /// Equal to a member of the constraint list
    In,
    /// Equal to no member of the constraint list
    NotIn,
}

/// A predicate on a candidate value
///
/// # Examples
///
/// ```
/// use kairos_domain::{Value, ValueComparator, ValueConstraint};
///
/// let high = ValueConstraint::new(ValueComparator::GreaterThanOrEqual, Value::Number(180.0));
/// assert!(high.matches(&Value::Number(200.0)));
/// assert!(!high.matches(&Value::Number(120.0)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueConstraint {
    /// How the candidate is compared
    pub comparator: ValueComparator,
    /// The value compared against
    pub value: Value,
}

impl ValueConstraint {
    /// Create a new constraint
    pub fn new(comparator: ValueComparator, value: Value) -> Self {
        Self { comparator, value }
    }

    /// Shorthand for an equality constraint
    pub fn equal_to(value: Value) -> Self {
        Self::new(ValueComparator::Equal, value)
    }

    /// Whether a candidate value satisfies the constraint
    ///
    /// Indeterminate comparisons never match.
    pub fn matches(&self, candidate: &Value) -> bool {
        let ordering = || candidate.compare(&self.value);
        match self.comparator {
            ValueComparator::Equal => ordering() == Some(Ordering::Equal),
            ValueComparator::NotEqual => match ordering() {
                Some(o) => o != Ordering::Equal,
                // Lists only compare for equality
                None => matches!((candidate, &self.value), (Value::List(a), Value::List(b)) if a != b),
            },
            ValueComparator::LessThan => ordering() == Some(Ordering::Less),
            ValueComparator::LessThanOrEqual => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            ValueComparator::GreaterThan => ordering() == Some(Ordering::Greater),
            ValueComparator::GreaterThanOrEqual => {
                matches!(ordering(), Some(Ordering::Greater | Ordering::Equal))
            }
            ValueComparator::In => self.members().any(|m| candidate.compare(m) == Some(Ordering::Equal)),
            ValueComparator::NotIn => !self.members().any(|m| candidate.compare(m) == Some(Ordering::Equal)),
        }
    }

    fn members(&self) -> impl Iterator<Item = &Value> {
        match &self.value {
            Value::List(values) => values.iter(),
            single => std::slice::from_ref(single).iter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booleans_compare_by_equality() {
        let not_true = ValueConstraint::new(ValueComparator::NotEqual, Value::Boolean(true));
        assert!(not_true.matches(&Value::Boolean(false)));
        assert!(!not_true.matches(&Value::Boolean(true)));
        assert!(ValueConstraint::equal_to(Value::Boolean(false)).matches(&Value::Boolean(false)));
        assert!(!ValueConstraint::equal_to(Value::Boolean(false)).matches(&Value::Boolean(true)));
    }

    #[test]
    fn test_lists_compare_by_equality() {
        let pair = Value::List(vec![Value::Number(1.0), Value::Number(2.0)]);
        let other = Value::List(vec![Value::Number(2.0)]);
        let not_pair = ValueConstraint::new(ValueComparator::NotEqual, pair.clone());
        assert!(not_pair.matches(&other));
        assert!(!not_pair.matches(&pair));
        assert!(ValueConstraint::equal_to(pair.clone()).matches(&pair));
        // Mismatched kinds stay indeterminate
        assert!(!not_pair.matches(&Value::Number(1.0)));
    }

    #[test]
    fn test_numeric_comparison() {
        assert_eq!(Value::Number(1.0).compare(&Value::Number(2.0)), Some(Ordering::Less));
        assert_eq!(Value::Number(2.0).compare(&Value::Nominal("2".into())), None);
    }

    #[test]
    fn test_inequality_comparison_is_only_determinate_when_safe() {
        let below_five = Value::Inequality { comparator: InequalityComparator::LessThan, number: 5.0 };
        assert_eq!(below_five.compare(&Value::Number(7.0)), Some(Ordering::Less));
        assert_eq!(below_five.compare(&Value::Number(5.0)), Some(Ordering::Less));
        assert_eq!(below_five.compare(&Value::Number(3.0)), None);
        assert_eq!(Value::Number(7.0).compare(&below_five), Some(Ordering::Greater));
    }

    #[test]
    fn test_constraint_comparators() {
        let five = Value::Number(5.0);
        assert!(ValueConstraint::equal_to(five.clone()).matches(&Value::Number(5.0)));
        assert!(ValueConstraint::new(ValueComparator::NotEqual, five.clone()).matches(&Value::Number(4.0)));
        assert!(ValueConstraint::new(ValueComparator::LessThan, five.clone()).matches(&Value::Number(4.0)));
        assert!(!ValueConstraint::new(ValueComparator::GreaterThan, five).matches(&Value::Number(4.0)));
    }

    #[test]
    fn test_membership() {
        let list = Value::List(vec!["HIGH".into(), "VERY_HIGH".into()]);
        let within = ValueConstraint::new(ValueComparator::In, list.clone());
        let outside = ValueConstraint::new(ValueComparator::NotIn, list);
        assert!(within.matches(&"HIGH".into()));
        assert!(!within.matches(&"LOW".into()));
        assert!(outside.matches(&"LOW".into()));
    }

    #[test]
    fn test_indeterminate_never_matches() {
        let constraint = ValueConstraint::new(ValueComparator::NotEqual, Value::Number(1.0));
        assert!(!constraint.matches(&Value::Boolean(true)));
    }

    #[test]
    fn test_value_types() {
        assert_eq!(Value::Number(1.0).value_type(), ValueType::Numerical);
        assert_eq!(
            Value::Inequality { comparator: InequalityComparator::GreaterThan, number: 1.0 }.value_type(),
            ValueType::Numerical
        );
        assert_eq!(Value::from("x").value_type(), ValueType::Nominal);
    }
}
