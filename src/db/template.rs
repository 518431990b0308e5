// Template persistence and template-driven table DDL

use rusqlite::{params, Connection};

use crate::constants::*;
use crate::data::schema::{ControlType, FieldDescriptor, Template};
use crate::data::value::{bool_to_database, parse_database_bool, quote};
use crate::error::{Result, TimelapseError};

/// Replace the stored template with the given one.
pub fn save_template(conn: &Connection, template: &Template) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(&format!("DELETE FROM {}", TABLE_TEMPLATE), [])?;
    for d in template.descriptors() {
        tx.execute(
            "INSERT INTO TemplateTable (ControlOrder, SpreadsheetOrder, Type, DefaultValue, Label, DataLabel, Tooltip, Width, Copyable, Visible, List)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                d.control_order,
                d.spreadsheet_order,
                d.control_type.as_str(),
                d.default_value,
                d.label,
                d.data_label,
                d.tooltip,
                d.width,
                bool_to_database(d.copyable),
                bool_to_database(d.visible),
                serde_json::to_string(&d.choice_list)?,
            ],
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Load the template in control order.
pub fn load_template(conn: &Connection) -> Result<Template> {
    let mut stmt = conn.prepare(
        "SELECT ControlOrder, SpreadsheetOrder, Type, DefaultValue, Label, DataLabel, Tooltip, Width, Copyable, Visible, List
         FROM TemplateTable ORDER BY ControlOrder, Id",
    )?;
    let raw = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i32>(0)?,
                row.get::<_, i32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i32>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
                row.get::<_, String>(10)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut descriptors = Vec::with_capacity(raw.len());
    for (control_order, spreadsheet_order, kind, default_value, label, data_label, tooltip, width, copyable, visible, list) in raw {
        let control_type: ControlType = kind.parse()?;
        let choice_list: Vec<String> = match serde_json::from_str(&list) {
            Ok(choices) => choices,
            Err(e) => {
                log::warn!("Template field {}: unreadable choice list ({})", data_label, e);
                Vec::new()
            }
        };
        descriptors.push(FieldDescriptor {
            data_label,
            control_type,
            label,
            default_value,
            choice_list,
            tooltip,
            width,
            visible: parse_database_bool(&visible).unwrap_or(true),
            copyable: parse_database_bool(&copyable).unwrap_or(true),
            control_order,
            spreadsheet_order,
        });
    }
    if descriptors.is_empty() {
        return Err(TimelapseError::Template("template table is empty".to_string()));
    }
    Template::new(descriptors)
}

/// DataTable: Id plus one TEXT column per template field.
pub fn data_table_ddl(template: &Template) -> String {
    let mut columns = vec![format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", COLUMN_ID)];
    for d in template.descriptors() {
        columns.push(format!("{} TEXT DEFAULT {}", d.data_label, quote(&d.default_value)));
    }
    format!("CREATE TABLE IF NOT EXISTS {} ({})", TABLE_DATA, columns.join(", "))
}

/// MarkersTable: one row per file, one TEXT column per counter.
pub fn markers_table_ddl(template: &Template) -> String {
    let mut columns = vec![format!("{} INTEGER PRIMARY KEY", COLUMN_ID)];
    for label in template.counter_labels() {
        columns.push(format!("{} TEXT DEFAULT ''", label));
    }
    format!("CREATE TABLE IF NOT EXISTS {} ({})", TABLE_MARKERS, columns.join(", "))
}

pub fn create_data_tables(conn: &Connection, template: &Template) -> Result<()> {
    conn.execute_batch(&data_table_ddl(template))?;
    conn.execute_batch(&markers_table_ddl(template))?;
    conn.execute_batch(&format!(
        "CREATE INDEX IF NOT EXISTS idx_data_path ON {} ({}, {})",
        TABLE_DATA, COLUMN_RELATIVE_PATH, COLUMN_FILE
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn template() -> Template {
        Template::with_user_controls(vec![
            FieldDescriptor::new("Deer", ControlType::Counter),
            FieldDescriptor::new("Habitat", ControlType::FixedChoice).with_choices(&["Forest", "Open"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_template_round_trip() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let original = template();
        save_template(&conn, &original).unwrap();
        let loaded = load_template(&conn).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_unknown_control_type_is_not_supported() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute("INSERT INTO TemplateTable (Type, DataLabel) VALUES ('Slider', 'S')", []).unwrap();
        assert!(matches!(load_template(&conn), Err(TimelapseError::NotSupported(_))));
    }

    #[test]
    fn test_generated_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let t = template();
        assert!(data_table_ddl(&t).contains("Deer TEXT DEFAULT '0'"));
        assert_eq!(markers_table_ddl(&t), "CREATE TABLE IF NOT EXISTS MarkersTable (Id INTEGER PRIMARY KEY, Deer TEXT DEFAULT '')");
        create_data_tables(&conn, &t).unwrap();
        create_data_tables(&conn, &t).unwrap();
    }
}
