// Search terms: one field's filter configuration

use std::fmt;
use std::str::FromStr;

use crate::constants::{COLUMN_DATE_TIME, COLUMN_RELATIVE_PATH, PATH_DB_SEPARATOR};
use crate::data::schema::{ControlType, FieldDescriptor};
use crate::error::{Result, TimelapseError};
use crate::select::predicate::{escape_glob, Affinity, ColumnRef, ComparisonOperator, Expr};
use crate::data::value::SqlLiteral;

/// Operators offered to the user. Display uses the symbols shown in menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Glob,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Operator::Equal,
        Operator::NotEqual,
        Operator::Less,
        Operator::Greater,
        Operator::LessOrEqual,
        Operator::GreaterOrEqual,
        Operator::Glob,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "\u{2260}",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::LessOrEqual => "\u{2264}",
            Operator::GreaterOrEqual => "\u{2265}",
            Operator::Glob => "GLOB",
        }
    }

    /// The SQL comparison, or `None` for GLOB.
    pub fn comparison(&self) -> Option<ComparisonOperator> {
        match self {
            Operator::Equal => Some(ComparisonOperator::Equal),
            Operator::NotEqual => Some(ComparisonOperator::NotEqual),
            Operator::Less => Some(ComparisonOperator::Less),
            Operator::Greater => Some(ComparisonOperator::Greater),
            Operator::LessOrEqual => Some(ComparisonOperator::LessOrEqual),
            Operator::GreaterOrEqual => Some(ComparisonOperator::GreaterOrEqual),
            Operator::Glob => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Accepts the display symbols and their ASCII spellings.
impl FromStr for Operator {
    type Err = TimelapseError;

    fn from_str(s: &str) -> Result<Self> {
        let op = match s.trim() {
            "=" | "==" => Operator::Equal,
            "\u{2260}" | "!=" | "<>" => Operator::NotEqual,
            "<" => Operator::Less,
            ">" => Operator::Greater,
            "\u{2264}" | "<=" => Operator::LessOrEqual,
            "\u{2265}" | ">=" => Operator::GreaterOrEqual,
            other if other.eq_ignore_ascii_case("glob") => Operator::Glob,
            other => return Err(TimelapseError::NotSupported(format!("unknown operator '{}'", other))),
        };
        Ok(op)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchTerm {
    pub data_label: String,
    pub label: String,
    pub control_type: ControlType,
    pub operator: Operator,
    /// Canonical database string compared against.
    pub database_value: String,
    pub use_for_searching: bool,
    pub list: Vec<String>,
}

impl SearchTerm {
    pub fn from_descriptor(descriptor: &FieldDescriptor) -> Self {
        SearchTerm {
            data_label: descriptor.data_label.clone(),
            label: descriptor.label.clone(),
            control_type: descriptor.control_type,
            operator: Operator::Equal,
            database_value: descriptor.default_value.clone(),
            use_for_searching: false,
            list: descriptor.choice_list.clone(),
        }
    }

    pub fn is_date_time(&self) -> bool {
        self.control_type == ControlType::DateTime || self.data_label == COLUMN_DATE_TIME
    }

    pub fn is_relative_path(&self) -> bool {
        self.data_label == COLUMN_RELATIVE_PATH
    }

    fn affinity(&self) -> Affinity {
        if self.control_type.is_boolean() {
            Affinity::NoCase
        } else if self.control_type == ControlType::Counter {
            Affinity::Integer
        } else {
            Affinity::Text
        }
    }

    /// The clause this term contributes when active.
    pub fn to_expr(&self) -> Expr {
        let column = ColumnRef::new(self.data_label.clone());

        // Empty and NULL are the same thing to the user
        if self.database_value.is_empty() && self.operator == Operator::Equal {
            return Expr::IsNull(column.clone()).or(Expr::Compare {
                column,
                op: ComparisonOperator::Equal,
                value: SqlLiteral::new(""),
                affinity: Affinity::Text,
            });
        }

        if self.is_relative_path() {
            let value = self.database_value.trim_end_matches(PATH_DB_SEPARATOR);
            let descendants = format!("{}{}*", escape_glob(value), PATH_DB_SEPARATOR);
            let expr = Expr::equals(self.data_label.clone(), value).or(Expr::Glob {
                column,
                pattern: SqlLiteral::new(descendants),
            });
            return if self.operator == Operator::NotEqual { expr.negate() } else { expr };
        }

        match self.operator.comparison() {
            Some(op) => Expr::Compare {
                column,
                op,
                value: SqlLiteral::new(self.database_value.clone()),
                affinity: self.affinity(),
            },
            None => Expr::Glob { column, pattern: SqlLiteral::new(self.database_value.clone()) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(label: &str, control_type: ControlType, operator: Operator, value: &str) -> SearchTerm {
        let mut term = SearchTerm::from_descriptor(&FieldDescriptor::new(label, control_type));
        term.operator = operator;
        term.database_value = value.to_string();
        term.use_for_searching = true;
        term
    }

    #[test]
    fn test_operator_symbols_parse_back() {
        for op in Operator::ALL {
            assert_eq!(op.symbol().parse::<Operator>().unwrap(), op);
        }
        assert_eq!("<=".parse::<Operator>().unwrap(), Operator::LessOrEqual);
        assert!(matches!("LIKE".parse::<Operator>(), Err(TimelapseError::NotSupported(_))));
    }

    #[test]
    fn test_empty_equal_matches_null() {
        let t = term("Species", ControlType::Note, Operator::Equal, "");
        assert_eq!(t.to_expr().to_sql(None), "(Species IS NULL OR Species = '')");
    }

    #[test]
    fn test_relative_path_includes_descendants() {
        let t = term("RelativePath", ControlType::RelativePath, Operator::Equal, "Site*1");
        assert_eq!(
            t.to_expr().to_sql(None),
            "(RelativePath = 'Site*1' OR RelativePath GLOB 'Site[*]1/*')"
        );
        let not = term("RelativePath", ControlType::RelativePath, Operator::NotEqual, "A");
        assert_eq!(not.to_expr().to_sql(None), "NOT (RelativePath = 'A' OR RelativePath GLOB 'A/*')");
    }

    #[test]
    fn test_boolean_and_counter_affinity() {
        let flag = term("DeleteFlag", ControlType::DeleteFlag, Operator::Equal, "true");
        assert_eq!(flag.to_expr().to_sql(None), "DeleteFlag = 'true' COLLATE NOCASE");
        let count = term("Deer", ControlType::Counter, Operator::Greater, "2");
        assert_eq!(count.to_expr().to_sql(None), "CAST(Deer AS INTEGER) > CAST('2' AS INTEGER)");
        let glob = term("Notes", ControlType::Note, Operator::Glob, "*fox*");
        assert_eq!(glob.to_expr().to_sql(None), "Notes GLOB '*fox*'");
    }
}
