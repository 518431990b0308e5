// Database module
// The selection engine and row layer only need two primitives from storage:
// run a command and run a query. Everything else is built on top of them.

pub mod file_database;
pub mod migrations;
pub mod template;

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use crate::constants::DB_FILE_EXTENSION;
use crate::data::column_tuple::ColumnTuplesWithWhere;
use crate::error::Result;

pub use file_database::FileDatabase;

/// A query result: column names plus rows of nullable text cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl DataTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell text by row index and column name; `None` for NULL or absent.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_deref()
    }
}

/// The storage collaborator. Failures are logged and surface as zero rows
/// affected or an empty result, so callers cannot tell a failed command from
/// one that matched nothing.
pub trait Database {
    /// Rows changed by the statement.
    fn execute_command(&self, statement: &str) -> usize;

    fn query(&self, select: &str) -> DataTable;

    /// Apply update batches to a table, continuing past failed ones.
    fn update(&self, table: &str, batches: &[ColumnTuplesWithWhere]) -> usize {
        batches
            .iter()
            .map(|batch| self.execute_command(&batch.to_update_statement(table)))
            .sum()
    }
}

/// SQLite-backed store.
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Open or create a database file and bring its fixed tables up to date.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_db(path)?;
        Ok(SqliteDatabase { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run_migrations(&conn)?;
        Ok(SqliteDatabase { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Like execute_command, but errors are returned.
    pub fn try_execute(&self, statement: &str) -> Result<usize> {
        let mut stmt = self.conn.prepare(statement)?;
        Ok(stmt.execute([])?)
    }

    /// Like query, but errors are returned.
    pub fn try_query(&self, select: &str) -> Result<DataTable> {
        let mut stmt = self.conn.prepare(select)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();
        let mut rows = Vec::new();
        let mut result = stmt.query([])?;
        while let Some(row) = result.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(cell_text(row.get_ref(i)?));
            }
            rows.push(cells);
        }
        Ok(DataTable { columns, rows })
    }

    /// Apply all batches in one transaction. Any failure rolls back every batch.
    pub fn try_update(&self, table: &str, batches: &[ColumnTuplesWithWhere]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut changed = 0;
        for batch in batches {
            changed += tx.execute(&batch.to_update_statement(table), [])?;
        }
        tx.commit()?;
        Ok(changed)
    }
}

impl Database for SqliteDatabase {
    fn execute_command(&self, statement: &str) -> usize {
        match self.try_execute(statement) {
            Ok(n) => n,
            Err(e) => {
                log::error!("Command failed: {} ({})", e, statement);
                0
            }
        }
    }

    fn query(&self, select: &str) -> DataTable {
        match self.try_query(select) {
            Ok(table) => table,
            Err(e) => {
                log::error!("Query failed: {} ({})", e, select);
                DataTable::default()
            }
        }
    }

    fn update(&self, table: &str, batches: &[ColumnTuplesWithWhere]) -> usize {
        match self.try_update(table, batches) {
            Ok(n) => n,
            Err(e) => {
                log::error!("Update of {} rows in {} failed: {}", batches.len(), table, e);
                0
            }
        }
    }
}

fn cell_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

/// Open or create a database at the given path
pub fn open_db(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;

    conn.execute_batch("PRAGMA journal_mode = WAL;")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}

/// The database file that sits next to a template file.
pub fn get_db_path(template_path: &Path) -> PathBuf {
    template_path.with_extension(DB_FILE_EXTENSION)
}
