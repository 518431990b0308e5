// Image set row: the session singleton

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::data::column_tuple::ColumnTuplesWithWhere;
use crate::data::row::{DataRow, DataRowBackedObject};
use crate::data::value::FieldValue;
use crate::error::Result;
use crate::select::custom_selection::FileSelection;
use crate::select::sort::SortTerms;

/// One quick paste control value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickPasteItem {
    pub data_label: String,
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub use_item: bool,
}

/// A named set of values pasted onto a file in one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickPasteEntry {
    pub title: String,
    #[serde(default = "enabled_by_default")]
    pub is_enabled: bool,
    #[serde(default)]
    pub items: Vec<QuickPasteItem>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSetRow {
    row: DataRow,
}

impl ImageSetRow {
    pub fn new(row: DataRow) -> Self {
        ImageSetRow { row }
    }

    /// The row written when an image set is created.
    pub fn with_defaults(id: i64) -> Self {
        let mut row = DataRow::new(id);
        row.set(COLUMN_LOG, FieldValue::Text(String::new()));
        row.set(COLUMN_SELECTION, FieldValue::Int(FileSelection::All.to_persisted()));
        row.set(COLUMN_SELECTED_FOLDER, FieldValue::Text(String::new()));
        row.set(COLUMN_MOST_RECENT_FILE_ID, FieldValue::Text(String::new()));
        row.set(COLUMN_SORT_TERMS, FieldValue::Text(SortTerms::get_default_sort_terms().to_persisted_string()));
        row.set(COLUMN_QUICK_PASTE, FieldValue::Text("[]".to_string()));
        row.set(COLUMN_VERSION_COMPATIBILITY, FieldValue::Text(VERSION_COMPATIBILITY.to_string()));
        ImageSetRow { row }
    }

    pub fn log(&self) -> String {
        self.row.get_string(COLUMN_LOG)
    }

    pub fn set_log(&mut self, log: &str) {
        self.row.set(COLUMN_LOG, FieldValue::Text(log.to_string()));
    }

    /// Unknown stored values read as `All`.
    pub fn file_selection(&self) -> FileSelection {
        let stored = self.row.get(COLUMN_SELECTION).and_then(|v| v.as_i64());
        match stored.and_then(FileSelection::from_persisted) {
            Some(selection) => selection,
            None => {
                log::warn!("Unknown file selection {:?}; using All", self.row.get_string(COLUMN_SELECTION));
                FileSelection::All
            }
        }
    }

    pub fn set_file_selection(&mut self, selection: FileSelection) {
        self.row.set(COLUMN_SELECTION, FieldValue::Int(selection.to_persisted()));
    }

    pub fn selected_folder(&self) -> String {
        self.row.get_string(COLUMN_SELECTED_FOLDER)
    }

    pub fn set_selected_folder(&mut self, folder: &str) {
        self.row.set(COLUMN_SELECTED_FOLDER, FieldValue::Text(folder.to_string()));
    }

    pub fn most_recent_file_id(&self) -> Option<i64> {
        self.row.get(COLUMN_MOST_RECENT_FILE_ID).and_then(|v| v.as_i64())
    }

    pub fn set_most_recent_file_id(&mut self, id: Option<i64>) {
        let value = match id {
            Some(id) => FieldValue::Int(id),
            None => FieldValue::Text(String::new()),
        };
        self.row.set(COLUMN_MOST_RECENT_FILE_ID, value);
    }

    pub fn sort_terms(&self) -> SortTerms {
        SortTerms::from_persisted_string(&self.row.get_string(COLUMN_SORT_TERMS))
    }

    pub fn set_sort_terms(&mut self, sort: &SortTerms) {
        self.row.set(COLUMN_SORT_TERMS, FieldValue::Text(sort.to_persisted_string()));
    }

    /// Unreadable quick paste state is logged and read as empty.
    pub fn quick_paste_entries(&self) -> Vec<QuickPasteEntry> {
        let stored = self.row.get_string(COLUMN_QUICK_PASTE);
        if stored.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str(&stored) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Ignoring unreadable quick paste entries: {}", e);
                Vec::new()
            }
        }
    }

    pub fn set_quick_paste_entries(&mut self, entries: &[QuickPasteEntry]) -> Result<()> {
        let json = serde_json::to_string(entries)?;
        self.row.set(COLUMN_QUICK_PASTE, FieldValue::Text(json));
        Ok(())
    }

    pub fn version_compatibility(&self) -> String {
        self.row.get_string(COLUMN_VERSION_COMPATIBILITY)
    }
}

impl DataRowBackedObject for ImageSetRow {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let row = ImageSetRow::with_defaults(1);
        assert_eq!(row.file_selection(), FileSelection::All);
        assert_eq!(row.sort_terms(), SortTerms::get_default_sort_terms());
        assert!(row.quick_paste_entries().is_empty());
        assert_eq!(row.most_recent_file_id(), None);
    }

    #[test]
    fn test_selection_persists_as_integer() {
        let mut row = ImageSetRow::with_defaults(1);
        row.set_file_selection(FileSelection::MarkedForDeletion);
        let batch = row.create_column_tuples_with_where_by_id().unwrap();
        let selection = batch.columns().iter().find(|c| c.name == COLUMN_SELECTION).unwrap();
        assert_eq!(selection.value, "5");

        row.data_row_mut().set(COLUMN_SELECTION, FieldValue::Text("99".to_string()));
        assert_eq!(row.file_selection(), FileSelection::All);
    }

    #[test]
    fn test_quick_paste_json() {
        let mut row = ImageSetRow::with_defaults(1);
        let entry = QuickPasteEntry {
            title: "Two deer".to_string(),
            is_enabled: true,
            items: vec![QuickPasteItem {
                data_label: "Deer".to_string(),
                label: "Deer".to_string(),
                value: "2".to_string(),
                use_item: true,
            }],
        };
        row.set_quick_paste_entries(&[entry.clone()]).unwrap();
        assert_eq!(row.quick_paste_entries(), vec![entry]);

        row.data_row_mut().set(COLUMN_QUICK_PASTE, FieldValue::Text("{not json".to_string()));
        assert!(row.quick_paste_entries().is_empty());
    }
}
