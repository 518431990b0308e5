// Selection predicate AST
// Predicates are built as expressions and only turned into SQL text at the
// storage boundary. The same tree can be evaluated against in-memory rows.

use std::cmp::Ordering;
use std::fmt;

use crate::data::value::SqlLiteral;

/// How a comparison coerces its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// Byte-wise text comparison (SQLite BINARY collation).
    Text,
    /// ASCII case-insensitive text comparison.
    NoCase,
    /// Both sides cast to INTEGER.
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

impl ComparisonOperator {
    pub fn sql(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "<>",
            ComparisonOperator::Less => "<",
            ComparisonOperator::Greater => ">",
            ComparisonOperator::LessOrEqual => "<=",
            ComparisonOperator::GreaterOrEqual => ">=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOperator::Equal => ordering == Ordering::Equal,
            ComparisonOperator::NotEqual => ordering != Ordering::Equal,
            ComparisonOperator::Less => ordering == Ordering::Less,
            ComparisonOperator::Greater => ordering == Ordering::Greater,
            ComparisonOperator::LessOrEqual => ordering != Ordering::Greater,
            ComparisonOperator::GreaterOrEqual => ordering != Ordering::Less,
        }
    }
}

/// A column reference. Unqualified references name data table columns and
/// pick up the render qualifier when one is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        ColumnRef { table: None, name: name.into() }
    }

    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        ColumnRef { table: Some(table.into()), name: name.into() }
    }

    pub fn render(&self, qualifier: Option<&str>) -> String {
        match (&self.table, qualifier) {
            (Some(table), _) => format!("{}.{}", table, self.name),
            (None, Some(q)) => format!("{}.{}", q, self.name),
            (None, None) => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        column: ColumnRef,
        op: ComparisonOperator,
        value: SqlLiteral,
        affinity: Affinity,
    },
    /// Comparison against an integer literal, rendered unquoted.
    CompareInteger {
        column: ColumnRef,
        op: ComparisonOperator,
        value: i64,
    },
    IsNull(ColumnRef),
    Glob {
        column: ColumnRef,
        pattern: SqlLiteral,
    },
    /// `column NOT IN (SELECT sub_column FROM sub_table)`
    NotInTable {
        column: ColumnRef,
        sub_table: String,
        sub_column: String,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn compare(column: impl Into<String>, op: ComparisonOperator, value: impl Into<String>) -> Self {
        Expr::Compare {
            column: ColumnRef::new(column),
            op,
            value: SqlLiteral::new(value),
            affinity: Affinity::Text,
        }
    }

    pub fn equals(column: impl Into<String>, value: impl Into<String>) -> Self {
        Expr::compare(column, ComparisonOperator::Equal, value)
    }

    pub fn id_equals(column: impl Into<String>, id: i64) -> Self {
        Expr::CompareInteger { column: ColumnRef::new(column), op: ComparisonOperator::Equal, value: id }
    }

    pub fn with_affinity(self, affinity: Affinity) -> Self {
        match self {
            Expr::Compare { column, op, value, .. } => Expr::Compare { column, op, value, affinity },
            other => other,
        }
    }

    /// AND two expressions, flattening nested ANDs.
    pub fn and(self, other: Expr) -> Expr {
        match (self, other) {
            (Expr::And(mut left), Expr::And(right)) => {
                left.extend(right);
                Expr::And(left)
            }
            (Expr::And(mut left), right) => {
                left.push(right);
                Expr::And(left)
            }
            (left, right) => Expr::And(vec![left, right]),
        }
    }

    /// OR two expressions, flattening nested ORs.
    pub fn or(self, other: Expr) -> Expr {
        match (self, other) {
            (Expr::Or(mut left), Expr::Or(right)) => {
                left.extend(right);
                Expr::Or(left)
            }
            (Expr::Or(mut left), right) => {
                left.push(right);
                Expr::Or(left)
            }
            (left, right) => Expr::Or(vec![left, right]),
        }
    }

    pub fn negate(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn to_sql(&self, qualifier: Option<&str>) -> String {
        self.render(qualifier, false)
    }

    fn render(&self, qualifier: Option<&str>, nested: bool) -> String {
        match self {
            Expr::Compare { column, op, value, affinity } => {
                let col = column.render(qualifier);
                match affinity {
                    Affinity::Text => format!("{} {} {}", col, op.sql(), value),
                    Affinity::NoCase => format!("{} {} {} COLLATE NOCASE", col, op.sql(), value),
                    Affinity::Integer => format!("CAST({} AS INTEGER) {} CAST({} AS INTEGER)", col, op.sql(), value),
                }
            }
            Expr::CompareInteger { column, op, value } => {
                format!("{} {} {}", column.render(qualifier), op.sql(), value)
            }
            Expr::IsNull(column) => format!("{} IS NULL", column.render(qualifier)),
            Expr::Glob { column, pattern } => format!("{} GLOB {}", column.render(qualifier), pattern),
            Expr::NotInTable { column, sub_table, sub_column } => format!(
                "{} NOT IN (SELECT {}.{} FROM {})",
                column.render(qualifier),
                sub_table,
                sub_column,
                sub_table
            ),
            Expr::And(children) => {
                let joined = join_children(children, " AND ", qualifier);
                if nested {
                    format!("({})", joined)
                } else {
                    joined
                }
            }
            Expr::Or(children) => format!("({})", join_children(children, " OR ", qualifier)),
            Expr::Not(inner) => format!("NOT {}", inner.render(qualifier, true)),
        }
    }

    /// Three-valued evaluation with SQLite semantics. `None` is SQL UNKNOWN.
    pub fn evaluate(&self, row: &dyn FieldLookup) -> Option<bool> {
        match self {
            Expr::Compare { column, op, value, affinity } => {
                let actual = row.lookup(&column.name)?;
                let ordering = compare_with_affinity(&actual, value.raw(), *affinity);
                Some(op.accepts(ordering))
            }
            Expr::CompareInteger { column, op, value } => {
                let actual = row.lookup(&column.name)?;
                Some(op.accepts(cast_integer(&actual).cmp(value)))
            }
            Expr::IsNull(column) => Some(row.lookup(&column.name).is_none()),
            Expr::Glob { column, pattern } => {
                let actual = row.lookup(&column.name)?;
                // An unclosed class never matches in SQLite
                let Some(translated) = translate_glob(pattern.raw()) else {
                    return Some(false);
                };
                match glob::Pattern::new(&translated) {
                    Ok(p) => Some(p.matches(&actual)),
                    Err(e) => {
                        log::debug!("Cannot evaluate GLOB '{}' in memory: {}", pattern.raw(), e);
                        None
                    }
                }
            }
            // Needs the related table; unknown against a lone row.
            Expr::NotInTable { .. } => None,
            Expr::And(children) => {
                let mut unknown = false;
                for child in children {
                    match child.evaluate(row) {
                        Some(false) => return Some(false),
                        None => unknown = true,
                        Some(true) => {}
                    }
                }
                if unknown { None } else { Some(true) }
            }
            Expr::Or(children) => {
                let mut unknown = false;
                for child in children {
                    match child.evaluate(row) {
                        Some(true) => return Some(true),
                        None => unknown = true,
                        Some(false) => {}
                    }
                }
                if unknown { None } else { Some(false) }
            }
            Expr::Not(inner) => inner.evaluate(row).map(|b| !b),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql(None))
    }
}

fn join_children(children: &[Expr], separator: &str, qualifier: Option<&str>) -> String {
    children
        .iter()
        .map(|c| c.render(qualifier, true))
        .collect::<Vec<_>>()
        .join(separator)
}

fn compare_with_affinity(actual: &str, expected: &str, affinity: Affinity) -> Ordering {
    match affinity {
        Affinity::Text => actual.as_bytes().cmp(expected.as_bytes()),
        Affinity::NoCase => actual.to_ascii_lowercase().cmp(&expected.to_ascii_lowercase()),
        Affinity::Integer => cast_integer(actual).cmp(&cast_integer(expected)),
    }
}

/// SQLite CAST(x AS INTEGER): longest leading integer prefix, else 0.
/// Out of range prefixes saturate.
fn cast_integer(value: &str) -> i64 {
    let trimmed = value.trim_start();
    let end = trimmed
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    let prefix = &trimmed[..end];
    match prefix.parse::<i64>() {
        Ok(n) => n,
        Err(_) if prefix.bytes().any(|b| b.is_ascii_digit()) => {
            if prefix.starts_with('-') {
                i64::MIN
            } else {
                i64::MAX
            }
        }
        Err(_) => 0,
    }
}

/// Rewrite a SQLite GLOB pattern in `glob::Pattern` syntax: `[^..]` negates
/// as `[!..]`, a literal `!` leads no class and runs of `*` collapse. `None`
/// for an unclosed class.
fn translate_glob(pattern: &str) -> Option<String> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                out.push('*');
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
            }
            '[' => {
                let mut j = i + 1;
                let negated = chars.get(j) == Some(&'^');
                if negated {
                    j += 1;
                }
                let start = j;
                // A leading ']' is a member
                if chars.get(j) == Some(&']') {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    return None;
                }
                let mut members = chars[start..j].to_vec();
                if members.first() == Some(&'!') {
                    let range_end = if members.len() >= 3 && members[1] == '-' { Some(members[2]) } else { None };
                    let lead = if range_end.is_some() { 3 } else { 1 };
                    let mut reordered = members[lead..].to_vec();
                    // '!'..=end is '!' plus '"'..=end
                    match range_end {
                        Some(end) if end > '"' => reordered.extend(['"', '-', end, '!']),
                        Some('"') => reordered.extend(['"', '!']),
                        _ => reordered.push('!'),
                    }
                    if reordered == ['!'] && !negated {
                        out.push('!');
                        i = j + 1;
                        continue;
                    }
                    members = reordered;
                }
                out.push('[');
                if negated {
                    out.push('!');
                }
                out.extend(members);
                out.push(']');
                i = j;
            }
            c => out.push(c),
        }
        i += 1;
    }
    Some(out)
}

/// Row access used by in-memory evaluation. `None` is SQL NULL.
pub trait FieldLookup {
    fn lookup(&self, column: &str) -> Option<String>;
}

/// `GROUP BY group_by HAVING MAX(confidence) BETWEEN low AND high`
#[derive(Debug, Clone, PartialEq)]
pub struct GroupByHaving {
    pub group_by: ColumnRef,
    pub confidence: ColumnRef,
    pub low: f64,
    pub high: f64,
}

impl GroupByHaving {
    pub fn to_sql(&self, qualifier: Option<&str>) -> String {
        format!(
            "GROUP BY {} HAVING MAX({}) BETWEEN {} AND {}",
            self.group_by.render(qualifier),
            self.confidence.render(qualifier),
            self.low,
            self.high
        )
    }
}

/// A complete file selection predicate: an optional filter plus an optional
/// best-confidence-per-group constraint. Empty means "select all".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Predicate {
    pub filter: Option<Expr>,
    pub group: Option<GroupByHaving>,
    /// Table used to qualify bare data columns when the query joins other tables.
    pub qualifier: Option<String>,
}

impl Predicate {
    pub fn is_empty(&self) -> bool {
        self.filter.is_none() && self.group.is_none()
    }

    pub fn to_sql(&self) -> String {
        let qualifier = self.qualifier.as_deref();
        let mut parts = Vec::new();
        if let Some(filter) = &self.filter {
            parts.push(format!("WHERE {}", filter.to_sql(qualifier)));
        }
        if let Some(group) = &self.group {
            parts.push(group.to_sql(qualifier));
        }
        parts.join(" ")
    }

    /// Evaluate the filter against one row. The group constraint ranges over
    /// joined detection rows and is not checked here.
    pub fn matches(&self, row: &dyn FieldLookup) -> bool {
        match &self.filter {
            Some(filter) => filter.evaluate(row) == Some(true),
            None => true,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

/// Escape GLOB metacharacters so a value only matches itself.
pub fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' | '?' | '[' => {
                escaped.push('[');
                escaped.push(ch);
                escaped.push(']');
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapRow(HashMap<&'static str, Option<&'static str>>);

    impl FieldLookup for MapRow {
        fn lookup(&self, column: &str) -> Option<String> {
            self.0.get(column).copied().flatten().map(str::to_string)
        }
    }

    fn row(pairs: &[(&'static str, Option<&'static str>)]) -> MapRow {
        MapRow(pairs.iter().copied().collect())
    }

    #[test]
    fn test_render_nested_groups() {
        let expr = Expr::equals("A", "1").or(Expr::equals("B", "2").and(Expr::equals("C", "3")));
        assert_eq!(expr.to_sql(None), "(A = '1' OR (B = '2' AND C = '3'))");
    }

    #[test]
    fn test_render_qualifier_and_affinity() {
        let expr = Expr::compare("Count", ComparisonOperator::GreaterOrEqual, "3").with_affinity(Affinity::Integer);
        assert_eq!(
            expr.to_sql(Some("DataTable")),
            "CAST(DataTable.Count AS INTEGER) >= CAST('3' AS INTEGER)"
        );
    }

    #[test]
    fn test_null_comparisons_are_unknown() {
        let r = row(&[("Species", None)]);
        assert_eq!(Expr::equals("Species", "").evaluate(&r), None);
        assert_eq!(Expr::IsNull(ColumnRef::new("Species")).evaluate(&r), Some(true));
        assert_eq!(Expr::equals("Species", "").negate().evaluate(&r), None);
    }

    #[test]
    fn test_nocase_and_integer_evaluation() {
        let r = row(&[("Flag", Some("TRUE")), ("Count", Some("10"))]);
        assert_eq!(Expr::equals("Flag", "true").evaluate(&r), Some(false));
        assert_eq!(Expr::equals("Flag", "true").with_affinity(Affinity::NoCase).evaluate(&r), Some(true));
        let text = Expr::compare("Count", ComparisonOperator::Greater, "9");
        assert_eq!(text.evaluate(&r), Some(false));
        assert_eq!(text.with_affinity(Affinity::Integer).evaluate(&r), Some(true));
    }

    #[test]
    fn test_glob_escape() {
        let r = row(&[("RelativePath", Some("cam[1]/a"))]);
        let pattern = format!("{}/*", escape_glob("cam[1]"));
        let expr = Expr::Glob { column: ColumnRef::new("RelativePath"), pattern: SqlLiteral::new(pattern) };
        assert_eq!(expr.evaluate(&r), Some(true));
    }

    #[test]
    fn test_glob_translation() {
        assert_eq!(translate_glob("a**").as_deref(), Some("a*"));
        assert_eq!(translate_glob("[^a]*").as_deref(), Some("[!a]*"));
        assert_eq!(translate_glob("[!]").as_deref(), Some("!"));
        assert_eq!(translate_glob("[!ab]").as_deref(), Some("[ab!]"));
        assert_eq!(translate_glob("[^]x]").as_deref(), Some("[!]x]"));
        assert_eq!(translate_glob("[!-z]").as_deref(), Some("[\"-z!]"));
        assert_eq!(translate_glob("cam[1"), None);

        let r = row(&[("File", Some("!x.jpg"))]);
        let glob = |p: &str| Expr::Glob { column: ColumnRef::new("File"), pattern: SqlLiteral::new(p) };
        assert_eq!(glob("[!]*").evaluate(&r), Some(true));
        assert_eq!(glob("[!a]x*").evaluate(&r), Some(true));
        assert_eq!(glob("[^!]*").evaluate(&r), Some(false));
        assert_eq!(glob("[!a").evaluate(&r), Some(false));
    }

    #[test]
    fn test_integer_cast_saturates() {
        assert_eq!(cast_integer("99999999999999999999"), i64::MAX);
        assert_eq!(cast_integer("-99999999999999999999"), i64::MIN);
        assert_eq!(cast_integer("12abc"), 12);
        assert_eq!(cast_integer("-"), 0);
        assert_eq!(cast_integer("fox"), 0);
        let r = row(&[("Count", Some("99999999999999999999"))]);
        let expr = Expr::compare("Count", ComparisonOperator::Greater, "5").with_affinity(Affinity::Integer);
        assert_eq!(expr.evaluate(&r), Some(true));
    }

    #[test]
    fn test_predicate_rendering() {
        let predicate = Predicate {
            filter: Some(Expr::equals("ImageQuality", "Dark")),
            group: Some(GroupByHaving {
                group_by: ColumnRef::qualified("DataTable", "Id"),
                confidence: ColumnRef::qualified("Detections", "conf"),
                low: 0.5,
                high: 1.0,
            }),
            qualifier: Some("DataTable".to_string()),
        };
        assert_eq!(
            predicate.to_sql(),
            "WHERE DataTable.ImageQuality = 'Dark' GROUP BY DataTable.Id HAVING MAX(Detections.conf) BETWEEN 0.5 AND 1"
        );
        assert!(Predicate::default().to_sql().is_empty());
    }
}
