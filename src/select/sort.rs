// Sort terms
// The session row persists the active sort as exactly eight comma separated
// slots: two (data label, display label, column type, ascending) quadruples.

use std::fmt;
use std::str::FromStr;

use crate::constants::*;
use crate::data::schema::{is_valid_data_label, ControlType};
use crate::data::value::{bool_to_database, parse_database_bool};
use crate::error::{Result, TimelapseError};
use crate::select::search_term::SearchTerm;

/// What a sort key orders by: the Id column or a template field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumnType {
    Id,
    Field(ControlType),
}

impl SortColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortColumnType::Id => COLUMN_ID,
            SortColumnType::Field(control_type) => control_type.as_str(),
        }
    }
}

impl fmt::Display for SortColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortColumnType {
    type Err = TimelapseError;

    fn from_str(s: &str) -> Result<Self> {
        if s == COLUMN_ID {
            return Ok(SortColumnType::Id);
        }
        s.parse().map(SortColumnType::Field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortTerm {
    pub data_label: String,
    pub display_label: String,
    pub column_type: SortColumnType,
    pub is_ascending: bool,
}

impl SortTerm {
    pub fn new(data_label: &str, display_label: &str, column_type: SortColumnType, is_ascending: bool) -> Self {
        SortTerm {
            data_label: data_label.to_string(),
            display_label: display_label.to_string(),
            column_type,
            is_ascending,
        }
    }

    pub fn id() -> Self {
        SortTerm::new(COLUMN_ID, SORT_LABEL_ID, SortColumnType::Id, true)
    }

    /// ORDER BY keys for this term. Relative path sorts by file name within
    /// each folder and counters sort numerically.
    fn order_keys(&self, qualifier: Option<&str>) -> Vec<String> {
        let column = |name: &str| match qualifier {
            Some(q) => format!("{}.{}", q, name),
            None => name.to_string(),
        };
        let direction = if self.is_ascending { "" } else { " DESC" };
        match self.column_type {
            SortColumnType::Field(ControlType::RelativePath) => vec![
                format!("{}{}", column(&self.data_label), direction),
                format!("{}{}", column(COLUMN_FILE), direction),
            ],
            SortColumnType::Field(ControlType::Counter) => {
                vec![format!("CAST({} AS INTEGER){}", column(&self.data_label), direction)]
            }
            _ => vec![format!("{}{}", column(&self.data_label), direction)],
        }
    }
}

/// The active sort: a primary and an optional secondary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortTerms {
    pub primary: SortTerm,
    pub secondary: Option<SortTerm>,
}

impl Default for SortTerms {
    fn default() -> Self {
        SortTerms::get_default_sort_terms()
    }
}

impl SortTerms {
    /// The sortable keys offered for a set of search terms. Id comes first,
    /// Folder, Date, Time and UtcOffset are left out and DateTime appears once.
    pub fn get_sort_terms(search_terms: &[SearchTerm]) -> Vec<SortTerm> {
        let mut terms = vec![SortTerm::id()];
        let mut date_time_seen = false;
        for search_term in search_terms {
            let display_label = match search_term.control_type {
                ControlType::Folder | ControlType::Date | ControlType::Time | ControlType::UtcOffset => continue,
                ControlType::DateTime => {
                    if date_time_seen {
                        continue;
                    }
                    date_time_seen = true;
                    SORT_LABEL_DATE_TIME
                }
                ControlType::File => SORT_LABEL_FILE,
                ControlType::RelativePath => SORT_LABEL_RELATIVE_PATH,
                _ => search_term.label.as_str(),
            };
            terms.push(SortTerm::new(
                &search_term.data_label,
                display_label,
                SortColumnType::Field(search_term.control_type),
                true,
            ));
        }
        terms
    }

    /// Relative path ascending, with no secondary key.
    pub fn get_default_sort_terms() -> SortTerms {
        SortTerms {
            primary: SortTerm::new(
                COLUMN_RELATIVE_PATH,
                SORT_LABEL_RELATIVE_PATH,
                SortColumnType::Field(ControlType::RelativePath),
                true,
            ),
            secondary: None,
        }
    }

    pub fn to_persisted_string(&self) -> String {
        let mut slots: Vec<String> = quadruple(Some(&self.primary));
        slots.extend(quadruple(self.secondary.as_ref()));
        slots.join(",")
    }

    /// Parse the eight slot form. Anything malformed yields the default sort.
    pub fn from_persisted_string(persisted: &str) -> SortTerms {
        match Self::try_from_persisted_string(persisted) {
            Ok(terms) => terms,
            Err(e) => {
                log::warn!("Ignoring stored sort terms '{}': {}", persisted, e);
                Self::get_default_sort_terms()
            }
        }
    }

    fn try_from_persisted_string(persisted: &str) -> Result<SortTerms> {
        let slots: Vec<&str> = persisted.split(',').collect();
        if slots.len() != SORT_TERM_SLOTS {
            return Err(TimelapseError::InvalidArgument(format!(
                "expected {} slots, found {}",
                SORT_TERM_SLOTS,
                slots.len()
            )));
        }
        let primary = parse_quadruple(&slots[0..4])?
            .ok_or_else(|| TimelapseError::InvalidArgument("primary sort term is empty".to_string()))?;
        let secondary = parse_quadruple(&slots[4..8])?;
        Ok(SortTerms { primary, secondary })
    }

    /// `ORDER BY ...` for this sort, with columns optionally qualified.
    pub fn order_by_clause(&self, qualifier: Option<&str>) -> String {
        let mut keys = self.primary.order_keys(qualifier);
        if let Some(secondary) = &self.secondary {
            for key in secondary.order_keys(qualifier) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        format!("ORDER BY {}", keys.join(", "))
    }

    /// Restrict this sort to keys the search terms offer. A primary key the
    /// template no longer has gives the default sort; a stale secondary is
    /// dropped.
    pub fn valid_for(&self, search_terms: &[SearchTerm]) -> SortTerms {
        let available = SortTerms::get_sort_terms(search_terms);
        let offered = |term: &SortTerm| {
            available
                .iter()
                .any(|t| t.data_label == term.data_label && t.column_type == term.column_type)
        };
        if !offered(&self.primary) {
            log::warn!("Sort field '{}' is not in the template; using the default sort", self.primary.data_label);
            return SortTerms::get_default_sort_terms();
        }
        let secondary = match &self.secondary {
            Some(term) if !offered(term) => {
                log::warn!("Dropping secondary sort field '{}'", term.data_label);
                None
            }
            other => other.clone(),
        };
        SortTerms { primary: self.primary.clone(), secondary }
    }
}

fn quadruple(term: Option<&SortTerm>) -> Vec<String> {
    match term {
        // Display labels are free text; keep them from adding slots
        Some(t) => vec![
            t.data_label.clone(),
            t.display_label.replace(',', " "),
            t.column_type.to_string(),
            bool_to_database(t.is_ascending).to_string(),
        ],
        None => vec![String::new(); 4],
    }
}

fn parse_quadruple(slots: &[&str]) -> Result<Option<SortTerm>> {
    let data_label = slots[0].trim();
    if data_label.is_empty() {
        return Ok(None);
    }
    if !is_valid_data_label(data_label) {
        return Err(TimelapseError::InvalidArgument(format!("'{}' is not a data label", data_label)));
    }
    let column_type: SortColumnType = slots[2].trim().parse()?;
    let is_ascending = parse_database_bool(slots[3]).ok_or_else(|| {
        TimelapseError::InvalidArgument(format!("'{}' is not an ascending flag", slots[3]))
    })?;
    Ok(Some(SortTerm::new(data_label, slots[1].trim(), column_type, is_ascending)))
}
