// Marker row: per-file counter markers
// Each counter column holds "x,y|x,y|..." with coordinates relative to the
// image, so both lie in [0, 1].

use std::fmt;

use crate::constants::{MARKER_COORDINATE_SEPARATOR, MARKER_POINT_SEPARATOR};
use crate::data::column_tuple::ColumnTuplesWithWhere;
use crate::data::row::{DataRow, DataRowBackedObject};
use crate::data::value::FieldValue;
use crate::error::{Result, TimelapseError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    x: f64,
    y: f64,
}

impl Marker {
    pub fn new(x: f64, y: f64) -> Result<Self> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(x) || !in_range(y) {
            return Err(TimelapseError::InvalidArgument(format!(
                "marker ({}, {}) lies outside the image",
                x, y
            )));
        }
        Ok(Marker { x, y })
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}{}{:.3}", self.x, MARKER_COORDINATE_SEPARATOR, self.y)
    }
}

/// Parse a stored point list. Malformed points are logged and skipped.
pub fn parse_markers(value: &str) -> Vec<Marker> {
    value
        .split(MARKER_POINT_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter_map(|point| {
            let parsed = point
                .split_once(MARKER_COORDINATE_SEPARATOR)
                .and_then(|(x, y)| Some((x.trim().parse().ok()?, y.trim().parse().ok()?)))
                .ok_or_else(|| TimelapseError::InvalidArgument(format!("'{}' is not an x,y pair", point)))
                .and_then(|(x, y)| Marker::new(x, y));
            match parsed {
                Ok(marker) => Some(marker),
                Err(e) => {
                    log::warn!("Skipping marker: {}", e);
                    None
                }
            }
        })
        .collect()
}

pub fn format_markers(markers: &[Marker]) -> String {
    markers
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join(&MARKER_POINT_SEPARATOR.to_string())
}

/// Markers for one file, keyed by the file's Id.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRow {
    row: DataRow,
}

impl MarkerRow {
    pub fn new(row: DataRow) -> Self {
        MarkerRow { row }
    }

    /// An empty row for a file, one column per counter.
    pub fn empty(file_id: i64, counters: &[&str]) -> Self {
        let mut row = DataRow::new(file_id);
        for counter in counters {
            row.set(counter, FieldValue::Text(String::new()));
        }
        MarkerRow { row }
    }

    pub fn markers(&self, counter: &str) -> Vec<Marker> {
        parse_markers(&self.row.get_string(counter))
    }

    pub fn set_markers(&mut self, counter: &str, markers: &[Marker]) {
        self.row.set(counter, FieldValue::Text(format_markers(markers)));
    }

    pub fn add_marker(&mut self, counter: &str, marker: Marker) {
        let mut markers = self.markers(counter);
        markers.push(marker);
        self.set_markers(counter, &markers);
    }

    pub fn counters(&self) -> impl Iterator<Item = &str> {
        self.row.labels()
    }
}

impl DataRowBackedObject for MarkerRow {
    fn data_row(&self) -> &DataRow {
        &self.row
    }

    fn data_row_mut(&mut self) -> &mut DataRow {
        &mut self.row
    }

    fn create_column_tuples_with_where_by_id(&self) -> Result<ColumnTuplesWithWhere> {
        ColumnTuplesWithWhere::by_id(self.row.column_tuples(), self.id())
    }
}
