// File database: the image set's tables behind typed rows

use std::collections::HashSet;
use std::path::Path;

use crate::constants::*;
use crate::data::column_tuple::ColumnTuplesWithWhere;
use crate::data::image_row::ImageRow;
use crate::data::image_set_row::ImageSetRow;
use crate::data::marker_row::MarkerRow;
use crate::data::row::DataRowBackedObject;
use crate::data::schema::{TableSchema, Template};
use crate::data::table::DataTableBackedList;
use crate::data::value::quote;
use crate::db::template::{create_data_tables, load_template, save_template};
use crate::db::{Database, SqliteDatabase};
use crate::error::Result;
use crate::select::custom_selection::{CustomSelection, FileSelection, LogicalOperator};
use crate::select::sort::SortTerms;

/// Rows per INSERT statement.
const INSERT_CHUNK: usize = 100;

pub struct FileDatabase<D: Database> {
    db: D,
    template: Template,
    schema: TableSchema,
}

impl FileDatabase<SqliteDatabase> {
    /// Create a new image set database from a template.
    pub fn create(path: &Path, template: Template) -> Result<Self> {
        let db = SqliteDatabase::open(path)?;
        Self::initialize(db, template)
    }

    pub fn create_in_memory(template: Template) -> Result<Self> {
        let db = SqliteDatabase::open_in_memory()?;
        Self::initialize(db, template)
    }

    /// Open an existing image set database, reading its stored template.
    pub fn open(path: &Path) -> Result<Self> {
        let db = SqliteDatabase::open(path)?;
        let template = load_template(db.connection())?;
        create_data_tables(db.connection(), &template)?;
        Ok(FileDatabase::new(db, template))
    }

    fn initialize(db: SqliteDatabase, template: Template) -> Result<Self> {
        save_template(db.connection(), &template)?;
        create_data_tables(db.connection(), &template)?;
        let sessions = db.try_query(&format!("SELECT {} FROM {}", COLUMN_ID, TABLE_IMAGE_SET))?;
        if sessions.is_empty() {
            let defaults = ImageSetRow::with_defaults(1);
            let columns = defaults.data_row().column_tuples();
            let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
            let values: Vec<String> = columns.iter().map(|c| quote(&c.value)).collect();
            db.try_execute(&format!(
                "INSERT INTO {} ({}) VALUES ({})",
                TABLE_IMAGE_SET,
                names.join(", "),
                values.join(", ")
            ))?;
        }
        Ok(FileDatabase::new(db, template))
    }
}

impl<D: Database> FileDatabase<D> {
    pub fn new(db: D, template: Template) -> Self {
        let schema = TableSchema::from_template(&template);
        FileDatabase { db, template, schema }
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Whether any recognition results have been imported.
    pub fn has_detections(&self) -> bool {
        let table = self.db.query(&format!("SELECT COUNT(*) AS Count FROM {}", TABLE_DETECTIONS));
        table.value(0, "Count").and_then(|v| v.parse::<i64>().ok()).unwrap_or(0) > 0
    }

    /// A fresh selection over this template, with detection filters when
    /// the image set has recognition data.
    pub fn custom_selection(&self, combinator: LogicalOperator) -> CustomSelection {
        let selection = CustomSelection::new(&self.template, combinator);
        if self.has_detections() {
            selection.with_detections()
        } else {
            selection
        }
    }

    /// Insert new file rows. The rows' Ids are ignored; the store assigns them.
    pub fn insert_files(&self, files: &[ImageRow]) -> usize {
        let labels: Vec<&str> = self.template.descriptors().iter().map(|d| d.data_label.as_str()).collect();
        let mut inserted = 0;
        for chunk in files.chunks(INSERT_CHUNK) {
            let values: Vec<String> = chunk
                .iter()
                .map(|file| {
                    let cells: Vec<String> = self
                        .template
                        .descriptors()
                        .iter()
                        .map(|d| match file.value(&d.data_label) {
                            Some(value) => quote(&value.to_database_string()),
                            None => quote(&d.default_value),
                        })
                        .collect();
                    format!("({})", cells.join(", "))
                })
                .collect();
            inserted += self.db.execute_command(&format!(
                "INSERT INTO {} ({}) VALUES {}",
                TABLE_DATA,
                labels.join(", "),
                values.join(", ")
            ));
        }
        inserted
    }

    /// Run a selection. A file appears once even when several detections match.
    /// Sort keys outside the selection's template fall back to the default sort.
    pub fn select_files(&self, selection: &CustomSelection, sort: &SortTerms) -> DataTableBackedList<ImageRow> {
        let sort = sort.valid_for(selection.search_terms());
        let table = self.db.query(&selection.select_files_query(&sort));
        let mut seen = HashSet::new();
        let rows = self
            .schema
            .ingest(&table)
            .into_iter()
            .filter(|row| seen.insert(row.id()))
            .map(ImageRow::new)
            .collect();
        DataTableBackedList::new(rows)
    }

    pub fn count_files(&self, selection: &CustomSelection) -> usize {
        let inner = selection.select_files_query(&SortTerms::get_default_sort_terms());
        let table = self.db.query(&format!("SELECT COUNT(DISTINCT {}) AS Count FROM ({})", COLUMN_ID, inner));
        table.value(0, "Count").and_then(|v| v.parse().ok()).unwrap_or(0)
    }

    pub fn update_files(&self, batches: &[ColumnTuplesWithWhere]) -> usize {
        self.db.update(TABLE_DATA, batches)
    }

    /// Persist every column of one row.
    pub fn update_file(&self, file: &ImageRow) -> usize {
        match file.create_column_tuples_with_where_by_id() {
            Ok(batch) => self.update_files(&[batch]),
            Err(e) => {
                log::warn!("Row {} not saved: {}", file.id(), e);
                0
            }
        }
    }

    /// Remove file rows along with their markers and recognition results.
    pub fn delete_files(&self, ids: &[i64]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let list = ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ");
        self.db.execute_command(&format!(
            "DELETE FROM {cls} WHERE {did} IN (SELECT {did} FROM {det} WHERE {id} IN ({list}))",
            cls = TABLE_CLASSIFICATIONS,
            det = TABLE_DETECTIONS,
            did = DETECTION_ID,
            id = COLUMN_ID,
            list = list
        ));
        self.db.execute_command(&format!("DELETE FROM {} WHERE {} IN ({})", TABLE_DETECTIONS, COLUMN_ID, list));
        self.db.execute_command(&format!("DELETE FROM {} WHERE {} IN ({})", TABLE_MARKERS, COLUMN_ID, list));
        self.db.execute_command(&format!("DELETE FROM {} WHERE {} IN ({})", TABLE_DATA, COLUMN_ID, list))
    }

    /// Soft delete every file flagged for deletion, then drop the rows whose
    /// file was moved. Files that could not be moved keep their rows.
    pub fn delete_files_marked_for_deletion(&self, root: &Path) -> usize {
        let mut selection = CustomSelection::new(&self.template, LogicalOperator::And);
        if let Err(e) = selection.set_custom_search_from_selection(FileSelection::MarkedForDeletion, None) {
            log::error!("Cannot select files marked for deletion: {}", e);
            return 0;
        }
        let marked = self.select_files(&selection, &SortTerms::get_default_sort_terms());
        let moved: Vec<i64> = marked
            .iter()
            .filter(|file| file.try_move_to_deleted_folder(root))
            .map(|file| file.id())
            .collect();
        if moved.len() < marked.len() {
            log::warn!("{} of {} marked files could not be moved", marked.len() - moved.len(), marked.len());
        }
        self.delete_files(&moved)
    }

    /// The session row, if the image set has one.
    pub fn image_set(&self) -> Option<ImageSetRow> {
        let table = self.db.query(&format!("SELECT * FROM {} ORDER BY {} LIMIT 1", TABLE_IMAGE_SET, COLUMN_ID));
        TableSchema::untyped().ingest(&table).into_iter().next().map(ImageSetRow::new)
    }

    pub fn save_image_set(&self, image_set: &ImageSetRow) -> usize {
        match image_set.create_column_tuples_with_where_by_id() {
            Ok(batch) => self.db.update(TABLE_IMAGE_SET, &[batch]),
            Err(e) => {
                log::warn!("Image set not saved: {}", e);
                0
            }
        }
    }

    /// Markers for a file; an empty row when none were recorded.
    pub fn markers(&self, file_id: i64) -> MarkerRow {
        let table = self.db.query(&format!("SELECT * FROM {} WHERE {} = {}", TABLE_MARKERS, COLUMN_ID, file_id));
        match TableSchema::untyped().ingest(&table).into_iter().next() {
            Some(row) => MarkerRow::new(row),
            None => MarkerRow::empty(file_id, &self.template.counter_labels()),
        }
    }

    pub fn save_markers(&self, markers: &MarkerRow) -> usize {
        let columns = markers.data_row().column_tuples();
        let mut names = vec![COLUMN_ID.to_string()];
        let mut values = vec![markers.id().to_string()];
        for column in &columns {
            names.push(column.name.clone());
            values.push(quote(&column.value));
        }
        self.db.execute_command(&format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            TABLE_MARKERS,
            names.join(", "),
            values.join(", ")
        ))
    }

    /// Record one detection for a file.
    pub fn insert_detection(&self, file_id: i64, category: &str, confidence: f64, bbox: &str) -> usize {
        self.db.execute_command(&format!(
            "INSERT INTO {} ({}, {}, {}, {}) VALUES ({}, {}, {}, {})",
            TABLE_DETECTIONS,
            COLUMN_ID,
            DETECTION_CATEGORY,
            DETECTION_CONF,
            DETECTION_BBOX,
            file_id,
            quote(category),
            confidence,
            quote(bbox)
        ))
    }

    /// Replace the label of each given detection category.
    pub fn set_detection_categories(&self, categories: &[(&str, &str)]) -> usize {
        self.set_categories(TABLE_DETECTION_CATEGORIES, categories)
    }

    pub fn set_classification_categories(&self, categories: &[(&str, &str)]) -> usize {
        self.set_categories(TABLE_CLASSIFICATION_CATEGORIES, categories)
    }

    fn set_categories(&self, table: &str, categories: &[(&str, &str)]) -> usize {
        categories
            .iter()
            .map(|(category, label)| {
                self.db.execute_command(&format!(
                    "INSERT OR REPLACE INTO {} ({}, {}) VALUES ({}, {})",
                    table,
                    DETECTION_CATEGORY,
                    CATEGORY_LABEL,
                    quote(category),
                    quote(label)
                ))
            })
            .sum()
    }

    /// (category, label) pairs in category order.
    pub fn detection_categories(&self) -> Vec<(String, String)> {
        let table = self.db.query(&format!(
            "SELECT {cat}, {label} FROM {table} ORDER BY {cat}",
            cat = DETECTION_CATEGORY,
            label = CATEGORY_LABEL,
            table = TABLE_DETECTION_CATEGORIES
        ));
        (0..table.len())
            .map(|i| {
                (
                    table.value(i, DETECTION_CATEGORY).unwrap_or_default().to_string(),
                    table.value(i, CATEGORY_LABEL).unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    /// Record a classification of an existing detection.
    pub fn insert_classification(&self, detection_id: i64, category: &str, confidence: f64) -> usize {
        self.db.execute_command(&format!(
            "INSERT INTO {} ({}, {}, {}) VALUES ({}, {}, {})",
            TABLE_CLASSIFICATIONS,
            DETECTION_CATEGORY,
            DETECTION_CONF,
            DETECTION_ID,
            quote(category),
            confidence,
            detection_id
        ))
    }

    /// (relative path, file) of every row, for skipping already known files.
    pub fn known_files(&self) -> HashSet<(String, String)> {
        let table = self.db.query(&format!("SELECT {}, {} FROM {}", COLUMN_RELATIVE_PATH, COLUMN_FILE, TABLE_DATA));
        (0..table.len())
            .map(|i| {
                (
                    table.value(i, COLUMN_RELATIVE_PATH).unwrap_or_default().to_string(),
                    table.value(i, COLUMN_FILE).unwrap_or_default().to_string(),
                )
            })
            .collect()
    }
}
