// Custom selection: builds the file selection predicate from search terms

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone};

use crate::constants::*;
use crate::data::schema::{ControlType, Template};
use crate::data::value::{bool_to_database, date_time_to_database, require_utc};
use crate::error::{Result, TimelapseError};
use crate::select::detection::DetectionSelections;
use crate::select::predicate::{Expr, Predicate};
use crate::select::search_term::{Operator, SearchTerm};
use crate::select::sort::SortTerms;

/// How active search terms combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => f.write_str("AND"),
            LogicalOperator::Or => f.write_str("OR"),
        }
    }
}

impl FromStr for LogicalOperator {
    type Err = TimelapseError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("and") {
            Ok(LogicalOperator::And)
        } else if s.eq_ignore_ascii_case("or") {
            Ok(LogicalOperator::Or)
        } else {
            Err(TimelapseError::NotSupported(format!("unknown combinator '{}'", s)))
        }
    }
}

/// One-click selections. Persisted in the session row as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSelection {
    All,
    Corrupted,
    Dark,
    Missing,
    Ok,
    MarkedForDeletion,
    Custom,
    Folders,
}

impl FileSelection {
    pub fn to_persisted(&self) -> i64 {
        match self {
            FileSelection::All => 0,
            FileSelection::Corrupted => 1,
            FileSelection::Dark => 2,
            FileSelection::Missing => 3,
            FileSelection::Ok => 4,
            FileSelection::MarkedForDeletion => 5,
            FileSelection::Custom => 6,
            FileSelection::Folders => 7,
        }
    }

    pub fn from_persisted(value: i64) -> Option<FileSelection> {
        let selection = match value {
            0 => FileSelection::All,
            1 => FileSelection::Corrupted,
            2 => FileSelection::Dark,
            3 => FileSelection::Missing,
            4 => FileSelection::Ok,
            5 => FileSelection::MarkedForDeletion,
            6 => FileSelection::Custom,
            7 => FileSelection::Folders,
            _ => return None,
        };
        Some(selection)
    }

    /// The image quality a quality shortcut selects.
    fn image_quality(&self) -> Option<&'static str> {
        match self {
            FileSelection::Ok => Some(IMAGE_QUALITY_CHOICES[0]),
            FileSelection::Dark => Some(IMAGE_QUALITY_CHOICES[1]),
            FileSelection::Missing => Some(IMAGE_QUALITY_CHOICES[2]),
            FileSelection::Corrupted => Some(IMAGE_QUALITY_CHOICES[3]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CustomSelection {
    search_terms: Vec<SearchTerm>,
    pub term_combining_operator: LogicalOperator,
    /// `None` when the image set has no recognition data.
    pub detection_selections: Option<DetectionSelections>,
}

impl CustomSelection {
    /// One term per template field except Folder. DateTime gets a lower
    /// bound term followed by an upper bound term.
    pub fn new(template: &Template, term_combining_operator: LogicalOperator) -> Self {
        let mut search_terms = Vec::new();
        for descriptor in template.descriptors() {
            match descriptor.control_type {
                ControlType::Folder => continue,
                ControlType::DateTime => {
                    let mut lower = SearchTerm::from_descriptor(descriptor);
                    lower.operator = Operator::GreaterOrEqual;
                    let mut upper = SearchTerm::from_descriptor(descriptor);
                    upper.operator = Operator::LessOrEqual;
                    search_terms.push(lower);
                    search_terms.push(upper);
                }
                _ => search_terms.push(SearchTerm::from_descriptor(descriptor)),
            }
        }
        CustomSelection { search_terms, term_combining_operator, detection_selections: None }
    }

    pub fn with_detections(mut self) -> Self {
        self.detection_selections = Some(DetectionSelections::default());
        self
    }

    pub fn search_terms(&self) -> &[SearchTerm] {
        &self.search_terms
    }

    pub fn search_terms_mut(&mut self) -> &mut [SearchTerm] {
        &mut self.search_terms
    }

    /// First term for a data label. For DateTime that is the lower bound.
    pub fn search_term(&self, data_label: &str) -> Option<&SearchTerm> {
        self.search_terms.iter().find(|t| t.data_label == data_label)
    }

    /// Activate a term with the given operator and value. Returns false when
    /// no term has that data label.
    pub fn set_search_term(&mut self, data_label: &str, operator: Operator, value: &str) -> bool {
        match self.search_terms.iter_mut().find(|t| t.data_label == data_label) {
            Some(term) => {
                term.operator = operator;
                term.database_value = value.to_string();
                term.use_for_searching = true;
                true
            }
            None => false,
        }
    }

    /// Activate both DateTime bounds so the range is inclusive at each end.
    pub fn set_date_time_range<Tz: TimeZone>(&mut self, lower: &DateTime<Tz>, upper: &DateTime<Tz>) -> Result<()> {
        let lower = date_time_to_database(&require_utc(lower)?);
        let upper = date_time_to_database(&require_utc(upper)?);
        let mut bounds = self.search_terms.iter_mut().filter(|t| t.control_type == ControlType::DateTime);
        let (low_term, high_term) = match (bounds.next(), bounds.next()) {
            (Some(l), Some(h)) => (l, h),
            _ => return Err(TimelapseError::InvalidArgument("template has no DateTime field".to_string())),
        };
        low_term.operator = Operator::GreaterOrEqual;
        low_term.database_value = lower;
        low_term.use_for_searching = true;
        high_term.operator = Operator::LessOrEqual;
        high_term.database_value = upper;
        high_term.use_for_searching = true;
        Ok(())
    }

    /// Select a folder and everything below it.
    pub fn set_relative_path_search_term(&mut self, relative_path: &str) -> bool {
        self.set_search_term(COLUMN_RELATIVE_PATH, Operator::Equal, relative_path)
    }

    /// Deactivate every term and the detection filter. Equivalent to "select all".
    pub fn clear_custom_search_uses(&mut self) {
        for term in &mut self.search_terms {
            term.use_for_searching = false;
        }
        if let Some(detections) = &mut self.detection_selections {
            detections.enabled = false;
        }
    }

    /// Express a one-click selection as search terms. All other terms are
    /// cleared first. `Custom` leaves the current terms as they are.
    pub fn set_custom_search_from_selection(
        &mut self,
        selection: FileSelection,
        relative_path: Option<&str>,
    ) -> Result<()> {
        if selection == FileSelection::Custom {
            return Ok(());
        }
        self.clear_custom_search_uses();
        if let Some(quality) = selection.image_quality() {
            self.set_search_term(COLUMN_IMAGE_QUALITY, Operator::Equal, quality);
            return Ok(());
        }
        match selection {
            FileSelection::MarkedForDeletion => {
                self.set_search_term(COLUMN_DELETE_FLAG, Operator::Equal, bool_to_database(true));
            }
            FileSelection::Folders => {
                let path = relative_path.ok_or_else(|| {
                    TimelapseError::InvalidArgument("a folder selection needs a relative path".to_string())
                })?;
                self.set_relative_path_search_term(path);
            }
            _ => {}
        }
        Ok(())
    }

    fn active_detections(&self) -> Option<&DetectionSelections> {
        self.detection_selections.as_ref().filter(|d| d.enabled)
    }

    /// The selection as an expression tree. Empty means "select all".
    pub fn get_files_predicate(&self) -> Predicate {
        let mut clauses: Vec<Expr> = Vec::new();
        let mut previous_was_lower_date_time = false;

        for (i, term) in self.search_terms.iter().enumerate() {
            if !term.use_for_searching {
                previous_was_lower_date_time = false;
                continue;
            }
            let expr = term.to_expr();
            let is_upper_date_time = term.control_type == ControlType::DateTime
                && i > 0
                && self.search_terms[i - 1].control_type == ControlType::DateTime;

            // The two bounds of one range always AND, whatever the combinator
            match clauses.pop() {
                Some(lower) if is_upper_date_time && previous_was_lower_date_time => {
                    clauses.push(Expr::And(vec![lower, expr]));
                }
                Some(previous) => {
                    clauses.push(previous);
                    clauses.push(expr);
                }
                None => clauses.push(expr),
            }
            previous_was_lower_date_time = term.control_type == ControlType::DateTime && !is_upper_date_time;
        }

        let mut predicate = Predicate::default();
        if let Some(detections) = self.active_detections() {
            predicate.qualifier = Some(TABLE_DATA.to_string());
            if detections.show_missing_detections {
                clauses.push(detections.missing_detections_expr());
            } else {
                if let Some(category) = detections.category_expr() {
                    clauses.push(category);
                }
                predicate.group = detections.group_by_having();
            }
        }
        predicate.filter = self.combine(clauses);
        predicate
    }

    fn combine(&self, mut clauses: Vec<Expr>) -> Option<Expr> {
        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(match self.term_combining_operator {
                LogicalOperator::And => Expr::And(clauses),
                LogicalOperator::Or => Expr::Or(clauses),
            }),
        }
    }

    /// WHERE clause text (with any GROUP BY / HAVING). Empty selects all.
    pub fn get_files_where(&self) -> String {
        self.get_files_predicate().to_sql()
    }

    /// The complete query selecting files in the given order.
    pub fn select_files_query(&self, sort: &SortTerms) -> String {
        let predicate = self.get_files_predicate();
        let detections = self.active_detections();
        let mut query = match detections {
            Some(d) if d.needs_join() => {
                format!("SELECT {data}.* FROM {data} {join}", data = TABLE_DATA, join = d.join_clause())
            }
            Some(_) => format!("SELECT {data}.* FROM {data}", data = TABLE_DATA),
            None => format!("SELECT * FROM {}", TABLE_DATA),
        };
        if !predicate.is_empty() {
            query.push(' ');
            query.push_str(&predicate.to_sql());
        }
        query.push(' ');
        match detections {
            Some(d) if d.needs_join() && d.rank_by_confidence => {
                query.push_str(&format!("ORDER BY {} DESC", d.confidence_column().render(None)));
            }
            _ => query.push_str(&sort.order_by_clause(predicate.qualifier.as_deref())),
        }
        query
    }
}
