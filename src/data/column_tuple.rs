// Column tuples and update batches

use chrono::{DateTime, Duration, TimeZone};

use crate::constants::{COLUMN_FILE, COLUMN_FOLDER, COLUMN_ID, COLUMN_RELATIVE_PATH};
use crate::data::schema::is_valid_data_label;
use crate::data::value::{
    bool_to_database, date_time_to_database, require_utc, utc_offset_to_database, FieldValue,
};
use crate::error::{Result, TimelapseError};
use crate::select::predicate::{ComparisonOperator, Expr};

/// A (data label, canonical value) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnTuple {
    pub name: String,
    pub value: String,
}

impl ColumnTuple {
    pub fn from_string(name: impl Into<String>, value: impl Into<String>) -> Self {
        ColumnTuple { name: name.into(), value: value.into() }
    }

    pub fn from_bool(name: impl Into<String>, value: bool) -> Self {
        Self::from_string(name, bool_to_database(value))
    }

    pub fn from_i64(name: impl Into<String>, value: i64) -> Self {
        Self::from_string(name, value.to_string())
    }

    pub fn from_i32(name: impl Into<String>, value: i32) -> Self {
        Self::from_string(name, value.to_string())
    }

    pub fn from_f64(name: impl Into<String>, value: f64) -> Self {
        Self::from_string(name, value.to_string())
    }

    /// Fails unless the instant is expressed in UTC.
    pub fn from_date_time<Tz: TimeZone>(name: impl Into<String>, value: &DateTime<Tz>) -> Result<Self> {
        let utc = require_utc(value)?;
        Ok(Self::from_string(name, date_time_to_database(&utc)))
    }

    /// Fails outside [-12h, +14h] or off the 15 minute grid.
    pub fn from_utc_offset(name: impl Into<String>, value: Duration) -> Result<Self> {
        Ok(Self::from_string(name, utc_offset_to_database(value)?))
    }

    pub fn from_field_value(name: impl Into<String>, value: &FieldValue) -> Self {
        Self::from_string(name, value.to_database_string())
    }

    fn comparison(&self, op: ComparisonOperator) -> Expr {
        Expr::compare(self.name.clone(), op, self.value.clone())
    }
}

/// A batch of column values plus the predicate selecting the rows they apply to.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTuplesWithWhere {
    columns: Vec<ColumnTuple>,
    where_clause: Option<Expr>,
}

impl ColumnTuplesWithWhere {
    pub fn new(columns: Vec<ColumnTuple>) -> Result<Self> {
        if columns.is_empty() {
            return Err(TimelapseError::InvalidArgument("an update needs at least one column".to_string()));
        }
        if let Some(bad) = columns.iter().find(|c| !is_valid_data_label(&c.name)) {
            return Err(TimelapseError::InvalidArgument(format!("'{}' is not a valid column name", bad.name)));
        }
        Ok(ColumnTuplesWithWhere { columns, where_clause: None })
    }

    pub fn by_id(columns: Vec<ColumnTuple>, id: i64) -> Result<Self> {
        let mut batch = Self::new(columns)?;
        batch.set_where_id(id);
        Ok(batch)
    }

    pub fn set_where_id(&mut self, id: i64) {
        self.where_clause = Some(Expr::id_equals(COLUMN_ID, id));
    }

    /// Select rows whose column equals (or differs from) the tuple's value.
    pub fn set_where_column(&mut self, column: &ColumnTuple, equal: bool) -> Result<()> {
        if !is_valid_data_label(&column.name) {
            return Err(TimelapseError::InvalidArgument(format!("'{}' is not a valid column name", column.name)));
        }
        let op = if equal { ComparisonOperator::Equal } else { ComparisonOperator::NotEqual };
        self.where_clause = Some(column.comparison(op));
        Ok(())
    }

    /// Select the single row identified by folder, relative path and file name.
    pub fn set_where_file(&mut self, folder: &str, relative_path: &str, file: &str) -> Result<()> {
        if file.is_empty() {
            return Err(TimelapseError::InvalidArgument("file name is empty".to_string()));
        }
        let expr = Expr::equals(COLUMN_FOLDER, folder)
            .and(Expr::equals(COLUMN_RELATIVE_PATH, relative_path))
            .and(Expr::equals(COLUMN_FILE, file));
        self.where_clause = Some(expr);
        Ok(())
    }

    pub fn columns(&self) -> &[ColumnTuple] {
        &self.columns
    }

    pub fn where_clause(&self) -> Option<&Expr> {
        self.where_clause.as_ref()
    }

    /// The predicate text without the WHERE keyword; empty when unrestricted.
    pub fn where_sql(&self) -> String {
        self.where_clause.as_ref().map(|w| w.to_sql(None)).unwrap_or_default()
    }

    pub fn to_update_statement(&self, table: &str) -> String {
        let assignments = self
            .columns
            .iter()
            .map(|c| format!("{} = {}", c.name, crate::data::value::quote(&c.value)))
            .collect::<Vec<_>>()
            .join(", ");
        match &self.where_clause {
            Some(w) => format!("UPDATE {} SET {} WHERE {}", table, assignments, w.to_sql(None)),
            None => format!("UPDATE {} SET {}", table, assignments),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_empty_batch_rejected() {
        assert!(matches!(ColumnTuplesWithWhere::new(vec![]), Err(TimelapseError::InvalidArgument(_))));
        let bad = vec![ColumnTuple::from_string("x = 1; --", "v")];
        assert!(ColumnTuplesWithWhere::new(bad).is_err());
    }

    #[test]
    fn test_update_by_id() {
        let batch = ColumnTuplesWithWhere::by_id(
            vec![ColumnTuple::from_bool("DeleteFlag", true), ColumnTuple::from_string("Notes", "it's a deer")],
            12,
        )
        .unwrap();
        assert_eq!(
            batch.to_update_statement("DataTable"),
            "UPDATE DataTable SET DeleteFlag = 'true', Notes = 'it''s a deer' WHERE Id = 12"
        );
        assert_eq!(batch.where_sql(), "Id = 12");
    }

    #[test]
    fn test_where_column_inequality() {
        let mut batch = ColumnTuplesWithWhere::new(vec![ColumnTuple::from_i64("Deer", 0)]).unwrap();
        batch
            .set_where_column(&ColumnTuple::from_string("ImageQuality", "Dark"), false)
            .unwrap();
        assert_eq!(batch.where_sql(), "ImageQuality <> 'Dark'");
    }

    #[test]
    fn test_where_file_triple() {
        let mut batch = ColumnTuplesWithWhere::new(vec![ColumnTuple::from_string("Notes", "x")]).unwrap();
        batch.set_where_file("Site1", "cam/a", "IMG_01.JPG").unwrap();
        assert_eq!(batch.where_sql(), "Folder = 'Site1' AND RelativePath = 'cam/a' AND File = 'IMG_01.JPG'");
        assert!(batch.set_where_file("Site1", "cam/a", "").is_err());
    }

    #[test]
    fn test_date_time_must_be_utc() {
        let utc = Utc.with_ymd_and_hms(2019, 6, 1, 12, 0, 0).unwrap();
        let tuple = ColumnTuple::from_date_time("DateTime", &utc).unwrap();
        assert_eq!(tuple.value, "2019-06-01T12:00:00.000Z");
        let local = FixedOffset::west_opt(7 * 3600).unwrap().with_ymd_and_hms(2019, 6, 1, 12, 0, 0).unwrap();
        assert!(matches!(
            ColumnTuple::from_date_time("DateTime", &local),
            Err(TimelapseError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_utc_offset_tuple() {
        let tuple = ColumnTuple::from_utc_offset("UtcOffset", Duration::minutes(5 * 60 + 15)).unwrap();
        assert_eq!(tuple.value.parse::<f64>().unwrap(), 5.25);
        assert!(ColumnTuple::from_utc_offset("UtcOffset", Duration::minutes(5 * 60 + 10)).is_err());
    }
}
