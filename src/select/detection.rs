// Detection and classification filters
// Recognition results live in the Detections table (one row per bounding box,
// keyed back to the file by Id) and the Classifications table (one row per
// classification of a detection).

use crate::constants::*;
use crate::data::value::SqlLiteral;
use crate::select::predicate::{Affinity, ColumnRef, ComparisonOperator, Expr, GroupByHaving};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionType {
    Detection,
    Classification,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSelections {
    pub enabled: bool,
    pub recognition_type: RecognitionType,
    pub detection_category: String,
    pub classification_category: String,
    /// Any category matches.
    pub all_detections: bool,
    /// Only the confidence range applies, typically a low range meaning "nothing found".
    pub empty_detections: bool,
    pub confidence_low: f64,
    pub confidence_high: f64,
    /// Return every matching detection ordered by confidence instead of one row per file.
    pub rank_by_confidence: bool,
    /// Select files that have no detections at all.
    pub show_missing_detections: bool,
}

impl Default for DetectionSelections {
    fn default() -> Self {
        DetectionSelections {
            enabled: false,
            recognition_type: RecognitionType::Detection,
            detection_category: "1".to_string(),
            classification_category: String::new(),
            all_detections: false,
            empty_detections: false,
            confidence_low: 0.8,
            confidence_high: 1.0,
            rank_by_confidence: false,
            show_missing_detections: false,
        }
    }
}

impl DetectionSelections {
    /// Whether the selection needs the recognition tables joined in.
    pub fn needs_join(&self) -> bool {
        self.enabled && !self.show_missing_detections
    }

    pub fn confidence_column(&self) -> ColumnRef {
        match self.recognition_type {
            RecognitionType::Detection => ColumnRef::qualified(TABLE_DETECTIONS, DETECTION_CONF),
            RecognitionType::Classification => ColumnRef::qualified(TABLE_CLASSIFICATIONS, DETECTION_CONF),
        }
    }

    /// The category equality, absent in all-categories and empty modes.
    pub fn category_expr(&self) -> Option<Expr> {
        if self.all_detections || self.empty_detections {
            return None;
        }
        let (table, value) = match self.recognition_type {
            RecognitionType::Detection => (TABLE_DETECTIONS, &self.detection_category),
            RecognitionType::Classification => (TABLE_CLASSIFICATIONS, &self.classification_category),
        };
        Some(Expr::Compare {
            column: ColumnRef::qualified(table, DETECTION_CATEGORY),
            op: ComparisonOperator::Equal,
            value: SqlLiteral::new(value.clone()),
            affinity: Affinity::Text,
        })
    }

    pub fn missing_detections_expr(&self) -> Expr {
        Expr::NotInTable {
            column: ColumnRef::qualified(TABLE_DATA, COLUMN_ID),
            sub_table: TABLE_DETECTIONS.to_string(),
            sub_column: COLUMN_ID.to_string(),
        }
    }

    /// One row per file whose best confidence falls in range. Skipped when ranking.
    pub fn group_by_having(&self) -> Option<GroupByHaving> {
        if self.rank_by_confidence {
            return None;
        }
        let (low, high) = if self.confidence_low <= self.confidence_high {
            (self.confidence_low, self.confidence_high)
        } else {
            (self.confidence_high, self.confidence_low)
        };
        Some(GroupByHaving {
            group_by: ColumnRef::qualified(TABLE_DATA, COLUMN_ID),
            confidence: self.confidence_column(),
            low,
            high,
        })
    }

    /// JOIN clauses bringing in the recognition tables.
    pub fn join_clause(&self) -> String {
        let mut join = format!(
            "INNER JOIN {det} ON {data}.{id} = {det}.{id}",
            det = TABLE_DETECTIONS,
            data = TABLE_DATA,
            id = COLUMN_ID
        );
        if self.recognition_type == RecognitionType::Classification {
            join.push_str(&format!(
                " INNER JOIN {cls} ON {cls}.{did} = {det}.{did}",
                cls = TABLE_CLASSIFICATIONS,
                det = TABLE_DETECTIONS,
                did = DETECTION_ID
            ));
        }
        join
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_skipped_in_all_and_empty_modes() {
        let mut d = DetectionSelections { enabled: true, ..Default::default() };
        assert_eq!(d.category_expr().unwrap().to_sql(None), "Detections.category = '1'");
        d.all_detections = true;
        assert!(d.category_expr().is_none());
        d.all_detections = false;
        d.empty_detections = true;
        assert!(d.category_expr().is_none());
    }

    #[test]
    fn test_classification_uses_its_own_columns() {
        let d = DetectionSelections {
            enabled: true,
            recognition_type: RecognitionType::Classification,
            classification_category: "7".to_string(),
            ..Default::default()
        };
        assert_eq!(d.category_expr().unwrap().to_sql(None), "Classifications.category = '7'");
        assert!(d.join_clause().ends_with("INNER JOIN Classifications ON Classifications.detectionID = Detections.detectionID"));
        assert_eq!(
            d.group_by_having().unwrap().to_sql(None),
            "GROUP BY DataTable.Id HAVING MAX(Classifications.conf) BETWEEN 0.8 AND 1"
        );
    }

    #[test]
    fn test_rank_by_confidence_drops_grouping() {
        let d = DetectionSelections { enabled: true, rank_by_confidence: true, ..Default::default() };
        assert!(d.group_by_having().is_none());
    }
}
