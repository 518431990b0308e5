// Row abstraction
// A DataRow is the generic backing store for one table row: a durable ID plus
// a map of data label -> typed value. Typed rows wrap one and add accessors.

use std::collections::BTreeMap;

use crate::constants::COLUMN_ID;
use crate::data::column_tuple::{ColumnTuple, ColumnTuplesWithWhere};
use crate::data::table::DataTableBackedList;
use crate::data::value::FieldValue;
use crate::error::Result;
use crate::select::predicate::FieldLookup;

#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    id: i64,
    values: BTreeMap<String, FieldValue>,
}

impl DataRow {
    pub fn new(id: i64) -> Self {
        DataRow { id, values: BTreeMap::new() }
    }

    /// Store-assigned identity. Never changes for the life of the row.
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn get(&self, data_label: &str) -> Option<&FieldValue> {
        self.values.get(data_label)
    }

    pub fn set(&mut self, data_label: &str, value: FieldValue) {
        self.values.insert(data_label.to_string(), value);
    }

    /// Canonical string of a field; missing and NULL fields read as empty.
    pub fn get_string(&self, data_label: &str) -> String {
        self.values
            .get(data_label)
            .map(|v| v.to_database_string())
            .unwrap_or_default()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every stored field as a column tuple, in label order.
    pub fn column_tuples(&self) -> Vec<ColumnTuple> {
        self.values
            .iter()
            .map(|(label, value)| ColumnTuple::from_field_value(label, value))
            .collect()
    }
}

impl FieldLookup for DataRow {
    fn lookup(&self, column: &str) -> Option<String> {
        if column == COLUMN_ID {
            return Some(self.id.to_string());
        }
        match self.values.get(column) {
            None | Some(FieldValue::Null) => None,
            Some(value) => Some(value.to_database_string()),
        }
    }
}

/// A typed view over a DataRow.
pub trait DataRowBackedObject {
    fn data_row(&self) -> &DataRow;

    fn data_row_mut(&mut self) -> &mut DataRow;

    /// The single path from an in-memory row to a persisted update: every
    /// canonical column of this row, selected by this row's ID. Fails when the
    /// row holds no columns.
    fn create_column_tuples_with_where_by_id(&self) -> Result<ColumnTuplesWithWhere>;

    fn id(&self) -> i64 {
        self.data_row().id()
    }

    /// Current position within a table snapshot. Transient: recompute after
    /// any mutation of the table.
    fn index_in<T: DataRowBackedObject>(&self, table: &DataTableBackedList<T>) -> Option<usize>
    where
        Self: Sized,
    {
        table.index_of_id(self.id())
    }
}
