use crate::{
    core::value::Value,
    execution::errors::ConfigError,
    records::row::Record,
};
use serde::Serialize;
use std::{cmp::Ordering, fmt, str::FromStr};

/// Comparison applied by a cleaning rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleOperator {
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Equal,
    NotEqual,
    In,
    NotIn,
}

const OPERATORS: &[(&str, RuleOperator)] = &[
    (">", RuleOperator::GreaterThan),
    ("<", RuleOperator::LessThan),
    (">=", RuleOperator::GreaterThanOrEqual),
    ("<=", RuleOperator::LessThanOrEqual),
    ("==", RuleOperator::Equal),
    ("!=", RuleOperator::NotEqual),
    ("in", RuleOperator::In),
    ("not_in", RuleOperator::NotIn),
];

impl RuleOperator {
    pub fn symbol(&self) -> &'static str {
        OPERATORS
            .iter()
            .find(|(_, op)| op == self)
            .map(|(symbol, _)| *symbol)
            .unwrap_or("?")
    }

    pub fn takes_list(&self) -> bool {
        matches!(self, RuleOperator::In | RuleOperator::NotIn)
    }

    /// Tests `actual` against a single target. `In`/`NotIn` are handled by
    /// [`Operand`].
    fn test(&self, actual: &Value, target: &Value) -> bool {
        let ordering = actual.compare(target);
        match self {
            RuleOperator::Equal | RuleOperator::In => ordering == Some(Ordering::Equal),
            RuleOperator::NotEqual | RuleOperator::NotIn => {
                matches!(ordering, Some(Ordering::Less | Ordering::Greater))
                    || (ordering.is_none() && !target.is_null())
            }
            RuleOperator::GreaterThan => ordering == Some(Ordering::Greater),
            RuleOperator::GreaterThanOrEqual => {
                matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
            }
            RuleOperator::LessThan => ordering == Some(Ordering::Less),
            RuleOperator::LessThanOrEqual => {
                matches!(ordering, Some(Ordering::Less | Ordering::Equal))
            }
        }
    }
}

impl FromStr for RuleOperator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OPERATORS
            .iter()
            .find(|(symbol, _)| *symbol == s.trim())
            .map(|(_, op)| *op)
            .ok_or_else(|| ConfigError::UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for RuleOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Operand {
    Scalar(Value),
    List(Vec<Value>),
}

/// A compiled `{column, condition, value}` cleaning rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub column: String,
    pub operator: RuleOperator,
    pub operand: Operand,
}

impl Rule {
    /// Compiles a rule from its configured parts, rejecting unknown operators
    /// and operands of the wrong shape.
    pub fn compile(
        column: &str,
        condition: &str,
        operand: &serde_json::Value,
    ) -> Result<Rule, ConfigError> {
        let operator = RuleOperator::from_str(condition)?;
        let invalid = |reason: &str| ConfigError::InvalidOperand {
            column: column.to_string(),
            condition: condition.to_string(),
            reason: reason.to_string(),
        };

        if column.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "rule `{condition}` has an empty column name"
            )));
        }

        let operand = match (operator.takes_list(), operand) {
            (true, serde_json::Value::Array(items)) => {
                Operand::List(items.iter().map(Value::from_json).collect())
            }
            (true, _) => return Err(invalid("expected a list of values")),
            (false, serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                return Err(invalid("expected a single value"));
            }
            (false, serde_json::Value::Null) => return Err(invalid("value is required")),
            (false, value) => Operand::Scalar(Value::from_json(value)),
        };

        Ok(Rule {
            column: column.to_string(),
            operator,
            operand,
        })
    }

    /// Returns whether the record passes this rule. A missing column or a
    /// null value never passes.
    pub fn evaluate(&self, record: &Record) -> bool {
        let actual = match record.get_value(&self.column) {
            Some(value) if !value.is_null() => value,
            _ => return false,
        };

        match (&self.operand, self.operator) {
            (Operand::List(items), RuleOperator::In) => {
                items.iter().any(|item| RuleOperator::In.test(actual, item))
            }
            (Operand::List(items), RuleOperator::NotIn) => {
                !items.iter().any(|item| RuleOperator::In.test(actual, item))
            }
            (Operand::Scalar(target), op) => op.test(actual, target),
            (Operand::List(_), _) => false,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::Scalar(v) => write!(f, "{} {} {}", self.column, self.operator, v),
            Operand::List(items) => {
                let items: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "{} {} [{}]", self.column, self.operator, items.join(", "))
            }
        }
    }
}
