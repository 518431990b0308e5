// Column schema: template field descriptors and per-column validators

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::data::row::DataRow;
use crate::data::value::{parse_database_bool, parse_database_date_time, parse_utc_offset, FieldValue};
use crate::db::DataTable;
use crate::error::{Result, TimelapseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlType {
    Note,
    Counter,
    Flag,
    FixedChoice,
    DateTime,
    UtcOffset,
    Date,
    Time,
    File,
    Folder,
    RelativePath,
    ImageQuality,
    DeleteFlag,
}

impl ControlType {
    pub const ALL: [ControlType; 13] = [
        ControlType::Note,
        ControlType::Counter,
        ControlType::Flag,
        ControlType::FixedChoice,
        ControlType::DateTime,
        ControlType::UtcOffset,
        ControlType::Date,
        ControlType::Time,
        ControlType::File,
        ControlType::Folder,
        ControlType::RelativePath,
        ControlType::ImageQuality,
        ControlType::DeleteFlag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlType::Note => "Note",
            ControlType::Counter => "Counter",
            ControlType::Flag => "Flag",
            ControlType::FixedChoice => "FixedChoice",
            ControlType::DateTime => COLUMN_DATE_TIME,
            ControlType::UtcOffset => COLUMN_UTC_OFFSET,
            ControlType::Date => COLUMN_DATE,
            ControlType::Time => COLUMN_TIME,
            ControlType::File => COLUMN_FILE,
            ControlType::Folder => COLUMN_FOLDER,
            ControlType::RelativePath => COLUMN_RELATIVE_PATH,
            ControlType::ImageQuality => COLUMN_IMAGE_QUALITY,
            ControlType::DeleteFlag => COLUMN_DELETE_FLAG,
        }
    }

    /// Flag-like columns compare case-insensitively.
    pub fn is_boolean(&self) -> bool {
        matches!(self, ControlType::Flag | ControlType::DeleteFlag)
    }

    /// Stock columns every data table carries regardless of template.
    pub fn is_stock(&self) -> bool {
        !matches!(
            self,
            ControlType::Note | ControlType::Counter | ControlType::Flag | ControlType::FixedChoice
        )
    }

    pub fn default_value(&self) -> &'static str {
        match self {
            ControlType::Counter => DEFAULT_COUNTER_VALUE,
            ControlType::Flag | ControlType::DeleteFlag => BOOLEAN_FALSE,
            ControlType::UtcOffset => DEFAULT_UTC_OFFSET,
            ControlType::ImageQuality => IMAGE_QUALITY_CHOICES[0],
            _ => "",
        }
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlType {
    type Err = TimelapseError;

    fn from_str(s: &str) -> Result<Self> {
        ControlType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TimelapseError::NotSupported(format!("unhandled control type '{}'", s)))
    }
}

/// Template-defined metadata for one data column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub data_label: String,
    pub control_type: ControlType,
    pub label: String,
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub choice_list: Vec<String>,
    #[serde(default)]
    pub tooltip: String,
    #[serde(default = "default_width")]
    pub width: i32,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub copyable: bool,
    #[serde(default)]
    pub control_order: i32,
    #[serde(default)]
    pub spreadsheet_order: i32,
}

fn default_width() -> i32 {
    100
}

fn default_true() -> bool {
    true
}

impl FieldDescriptor {
    pub fn new(data_label: impl Into<String>, control_type: ControlType) -> Self {
        let data_label = data_label.into();
        let choice_list = if control_type == ControlType::ImageQuality {
            IMAGE_QUALITY_CHOICES.iter().map(|c| c.to_string()).collect()
        } else {
            Vec::new()
        };
        FieldDescriptor {
            label: data_label.clone(),
            data_label,
            control_type,
            default_value: control_type.default_value().to_string(),
            choice_list,
            tooltip: String::new(),
            width: default_width(),
            visible: !matches!(control_type, ControlType::Folder | ControlType::Date | ControlType::Time),
            copyable: !control_type.is_stock(),
            control_order: 0,
            spreadsheet_order: 0,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choice_list = choices.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = default_value.into();
        self
    }
}

/// Data labels become bare column names, so they are restricted to identifiers.
pub fn is_valid_data_label(label: &str) -> bool {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Ordered list of field descriptors describing one image set's data table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    descriptors: Vec<FieldDescriptor>,
}

impl Template {
    pub fn new(descriptors: Vec<FieldDescriptor>) -> Result<Self> {
        let mut seen = HashMap::new();
        for (i, descriptor) in descriptors.iter().enumerate() {
            if !is_valid_data_label(&descriptor.data_label) {
                return Err(TimelapseError::Template(format!(
                    "data label '{}' is not a valid column name",
                    descriptor.data_label
                )));
            }
            if descriptor.data_label.eq_ignore_ascii_case(COLUMN_ID) {
                return Err(TimelapseError::Template(format!("data label '{}' is reserved", COLUMN_ID)));
            }
            if let Some(previous) = seen.insert(descriptor.data_label.to_ascii_lowercase(), i) {
                return Err(TimelapseError::Template(format!(
                    "data label '{}' appears at positions {} and {}",
                    descriptor.data_label, previous, i
                )));
            }
        }
        Ok(Template { descriptors })
    }

    /// The stock columns every image set carries, in display order.
    pub fn standard_controls() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::new(COLUMN_FILE, ControlType::File).with_label("File"),
            FieldDescriptor::new(COLUMN_RELATIVE_PATH, ControlType::RelativePath).with_label("Relative path"),
            FieldDescriptor::new(COLUMN_FOLDER, ControlType::Folder).with_label("Folder"),
            FieldDescriptor::new(COLUMN_DATE, ControlType::Date).with_label("Date"),
            FieldDescriptor::new(COLUMN_TIME, ControlType::Time).with_label("Time"),
            FieldDescriptor::new(COLUMN_DATE_TIME, ControlType::DateTime).with_label("Date time"),
            FieldDescriptor::new(COLUMN_UTC_OFFSET, ControlType::UtcOffset).with_label("UTC offset"),
            FieldDescriptor::new(COLUMN_IMAGE_QUALITY, ControlType::ImageQuality).with_label("Image quality"),
            FieldDescriptor::new(COLUMN_DELETE_FLAG, ControlType::DeleteFlag).with_label("Delete?"),
        ]
    }

    /// Stock controls followed by the given user controls, with orders assigned.
    pub fn with_user_controls(user_controls: Vec<FieldDescriptor>) -> Result<Self> {
        let mut descriptors = Self::standard_controls();
        descriptors.extend(user_controls);
        for (i, descriptor) in descriptors.iter_mut().enumerate() {
            descriptor.control_order = i as i32 + 1;
            descriptor.spreadsheet_order = i as i32 + 1;
        }
        Self::new(descriptors)
    }

    pub fn descriptors(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, data_label: &str) -> Option<&FieldDescriptor> {
        self.descriptors.iter().find(|d| d.data_label == data_label)
    }

    /// Data labels of all counter controls (the marker table's columns).
    pub fn counter_labels(&self) -> Vec<&str> {
        self.descriptors
            .iter()
            .filter(|d| d.control_type == ControlType::Counter)
            .map(|d| d.data_label.as_str())
            .collect()
    }
}

/// Per-column validator built from a field descriptor.
pub trait FileTableColumn: fmt::Debug {
    fn descriptor(&self) -> &FieldDescriptor;

    fn is_content_valid(&self, value: &str) -> bool;

    fn data_label(&self) -> &str {
        &self.descriptor().data_label
    }

    fn control_type(&self) -> ControlType {
        self.descriptor().control_type
    }

    /// Convert a stored value to its typed form. Content that fails validation
    /// is kept verbatim as text.
    fn parse(&self, value: Option<&str>) -> FieldValue {
        let raw = match value {
            None => return FieldValue::Null,
            Some(raw) => raw,
        };
        if !self.is_content_valid(raw) {
            return FieldValue::Text(raw.to_string());
        }
        typed_value(self.control_type(), raw)
    }
}

fn typed_value(control_type: ControlType, raw: &str) -> FieldValue {
    let typed = match control_type {
        ControlType::Counter => raw.trim().parse().ok().map(FieldValue::Int),
        ControlType::Flag | ControlType::DeleteFlag => parse_database_bool(raw).map(FieldValue::Bool),
        ControlType::DateTime => parse_database_date_time(raw).map(FieldValue::DateTimeUtc),
        ControlType::UtcOffset => parse_utc_offset(raw).ok().map(FieldValue::UtcOffset),
        _ => None,
    };
    typed.unwrap_or_else(|| FieldValue::Text(raw.to_string()))
}

/// Free text: notes, file names, folders and the display date/time strings.
#[derive(Debug, Clone)]
pub struct NoteColumn {
    descriptor: FieldDescriptor,
}

impl FileTableColumn for NoteColumn {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_content_valid(&self, _value: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct CounterColumn {
    descriptor: FieldDescriptor,
}

impl FileTableColumn for CounterColumn {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_content_valid(&self, value: &str) -> bool {
        value.trim().parse::<i64>().is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct FlagColumn {
    descriptor: FieldDescriptor,
}

impl FileTableColumn for FlagColumn {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_content_valid(&self, value: &str) -> bool {
        parse_database_bool(value).is_some()
    }
}

/// Fixed choices and image quality. Accepts any text, like notes.
#[derive(Debug, Clone)]
pub struct ChoiceColumn {
    descriptor: FieldDescriptor,
}

impl FileTableColumn for ChoiceColumn {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_content_valid(&self, _value: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct DateTimeColumn {
    descriptor: FieldDescriptor,
}

impl FileTableColumn for DateTimeColumn {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_content_valid(&self, value: &str) -> bool {
        parse_database_date_time(value).is_some()
    }
}

#[derive(Debug, Clone)]
pub struct UtcOffsetColumn {
    descriptor: FieldDescriptor,
}

impl FileTableColumn for UtcOffsetColumn {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn is_content_valid(&self, value: &str) -> bool {
        value.trim().parse::<f64>().is_ok()
    }
}

/// Build the validator matching a descriptor's control type.
pub fn create_column_matching_control_rows_type(descriptor: &FieldDescriptor) -> Box<dyn FileTableColumn> {
    let descriptor = descriptor.clone();
    match descriptor.control_type {
        ControlType::Note
        | ControlType::File
        | ControlType::Folder
        | ControlType::RelativePath
        | ControlType::Date
        | ControlType::Time => Box::new(NoteColumn { descriptor }),
        ControlType::Counter => Box::new(CounterColumn { descriptor }),
        ControlType::Flag | ControlType::DeleteFlag => Box::new(FlagColumn { descriptor }),
        ControlType::FixedChoice | ControlType::ImageQuality => Box::new(ChoiceColumn { descriptor }),
        ControlType::DateTime => Box::new(DateTimeColumn { descriptor }),
        ControlType::UtcOffset => Box::new(UtcOffsetColumn { descriptor }),
    }
}

/// Validators for every column of a data table, keyed by data label.
#[derive(Debug)]
pub struct TableSchema {
    columns: Vec<Box<dyn FileTableColumn>>,
    by_label: HashMap<String, usize>,
}

impl TableSchema {
    pub fn from_template(template: &Template) -> Self {
        let columns: Vec<Box<dyn FileTableColumn>> = template
            .descriptors()
            .iter()
            .map(create_column_matching_control_rows_type)
            .collect();
        let by_label = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.data_label().to_string(), i))
            .collect();
        TableSchema { columns, by_label }
    }

    /// A schema with no columns; every value ingests as text.
    pub fn untyped() -> Self {
        TableSchema { columns: Vec::new(), by_label: HashMap::new() }
    }

    pub fn column(&self, data_label: &str) -> Option<&dyn FileTableColumn> {
        self.by_label.get(data_label).map(|&i| self.columns[i].as_ref())
    }

    pub fn columns(&self) -> impl Iterator<Item = &dyn FileTableColumn> {
        self.columns.iter().map(|c| c.as_ref())
    }

    /// Validate and convert one raw value for the named column.
    pub fn parse_value(&self, data_label: &str, raw: &str) -> Result<FieldValue> {
        let column = self.column(data_label).ok_or_else(|| {
            TimelapseError::InvalidArgument(format!("no column named '{}'", data_label))
        })?;
        if !column.is_content_valid(raw) {
            return Err(TimelapseError::InvalidArgument(format!(
                "'{}' is not a valid {} value for {}",
                raw,
                column.control_type(),
                data_label
            )));
        }
        Ok(column.parse(Some(raw)))
    }

    /// Convert a raw query result into typed rows. Rows without a parseable
    /// Id column are dropped.
    pub fn ingest(&self, table: &DataTable) -> Vec<DataRow> {
        let id_index = match table.column_index(COLUMN_ID) {
            Some(i) => i,
            None => {
                log::warn!("query result has no {} column; no rows ingested", COLUMN_ID);
                return Vec::new();
            }
        };

        let mut rows = Vec::with_capacity(table.rows.len());
        for raw in &table.rows {
            let id = match raw.get(id_index).and_then(|v| v.as_deref()).and_then(|v| v.parse::<i64>().ok()) {
                Some(id) => id,
                None => {
                    log::warn!("skipping row with unreadable {}", COLUMN_ID);
                    continue;
                }
            };
            let mut row = DataRow::new(id);
            for (i, name) in table.columns.iter().enumerate() {
                if i == id_index {
                    continue;
                }
                let cell = raw.get(i).and_then(|v| v.as_deref());
                let value = match self.column(name) {
                    Some(column) => {
                        if let Some(text) = cell {
                            if !column.is_content_valid(text) {
                                log::warn!("row {}: '{}' is not a valid {} value for {}", id, text, column.control_type(), name);
                            }
                        }
                        column.parse(cell)
                    }
                    None => cell.map(|c| FieldValue::Text(c.to_string())).unwrap_or(FieldValue::Null),
                };
                row.set(name, value);
            }
            rows.push(row);
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(control_type: ControlType) -> Box<dyn FileTableColumn> {
        create_column_matching_control_rows_type(&FieldDescriptor::new("Field", control_type))
    }

    #[test]
    fn test_factory_covers_every_control_type() {
        for control_type in ControlType::ALL {
            let col = column(control_type);
            assert_eq!(col.control_type(), control_type);
            assert_eq!(control_type.as_str().parse::<ControlType>().unwrap(), control_type);
        }
        assert!(matches!("Slider".parse::<ControlType>(), Err(TimelapseError::NotSupported(_))));
    }

    #[test]
    fn test_validators() {
        assert!(column(ControlType::Note).is_content_valid("anything at all"));
        assert!(column(ControlType::Counter).is_content_valid("42"));
        assert!(!column(ControlType::Counter).is_content_valid("4.2"));
        assert!(column(ControlType::Flag).is_content_valid("TRUE"));
        assert!(!column(ControlType::DeleteFlag).is_content_valid("yes"));
        assert!(column(ControlType::DateTime).is_content_valid("2020-01-02T03:04:05.000Z"));
        assert!(!column(ControlType::DateTime).is_content_valid("02-Jan-2020"));
        assert!(column(ControlType::UtcOffset).is_content_valid("-3.5"));
        assert!(!column(ControlType::UtcOffset).is_content_valid("east"));
        assert!(column(ControlType::FixedChoice).is_content_valid("not in the list"));
        assert!(column(ControlType::ImageQuality).is_content_valid("Blurry"));
    }

    #[test]
    fn test_parse_keeps_invalid_content_as_text() {
        assert_eq!(column(ControlType::Counter).parse(Some("7")), FieldValue::Int(7));
        assert_eq!(column(ControlType::Counter).parse(Some("")), FieldValue::Text(String::new()));
        assert_eq!(column(ControlType::Flag).parse(Some("True")), FieldValue::Bool(true));
        assert_eq!(column(ControlType::Note).parse(None), FieldValue::Null);
    }

    #[test]
    fn test_template_rejects_bad_labels() {
        let dup = vec![
            FieldDescriptor::new("Species", ControlType::Note),
            FieldDescriptor::new("species", ControlType::Counter),
        ];
        assert!(Template::new(dup).is_err());
        assert!(Template::new(vec![FieldDescriptor::new("a b", ControlType::Note)]).is_err());
        assert!(Template::new(vec![FieldDescriptor::new("x'--", ControlType::Note)]).is_err());
        assert!(Template::new(vec![FieldDescriptor::new("Id", ControlType::Note)]).is_err());
    }

    #[test]
    fn test_standard_template_and_counters() {
        let template = Template::with_user_controls(vec![
            FieldDescriptor::new("Deer", ControlType::Counter),
            FieldDescriptor::new("Notes", ControlType::Note),
        ])
        .unwrap();
        assert_eq!(template.descriptors().len(), 11);
        assert_eq!(template.counter_labels(), vec!["Deer"]);
        assert_eq!(template.descriptor("Notes").unwrap().control_order, 11);
    }

    #[test]
    fn test_ingest_types_values() {
        let template = Template::with_user_controls(vec![FieldDescriptor::new("Deer", ControlType::Counter)]).unwrap();
        let schema = TableSchema::from_template(&template);
        let table = DataTable {
            columns: vec!["Id".into(), "Deer".into(), "DeleteFlag".into(), "Extra".into()],
            rows: vec![
                vec![Some("3".into()), Some("2".into()), Some("false".into()), None],
                vec![None, Some("1".into()), None, None],
            ],
        };
        let rows = schema.ingest(&table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id(), 3);
        assert_eq!(rows[0].get("Deer"), Some(&FieldValue::Int(2)));
        assert_eq!(rows[0].get("DeleteFlag"), Some(&FieldValue::Bool(false)));
        assert_eq!(rows[0].get("Extra"), Some(&FieldValue::Null));
    }
}
