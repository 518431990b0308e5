// Selection tests against real rows, both in memory and through SQLite

use chrono::{Duration, TimeZone, Utc};

use super::*;
use crate::data::image_row::{ImageQuality, ImageRow};
use crate::data::row::DataRowBackedObject;
use crate::data::schema::{ControlType, FieldDescriptor, Template};
use crate::db::{FileDatabase, SqliteDatabase};

fn template() -> Template {
    Template::with_user_controls(vec![
        FieldDescriptor::new("Deer", ControlType::Counter),
        FieldDescriptor::new("Species", ControlType::FixedChoice).with_choices(&["Deer", "Fox"]),
    ])
    .unwrap()
}

/// Files under A, A/B, AB and C, one per folder, dated a day apart.
fn populated() -> FileDatabase<SqliteDatabase> {
    let db = FileDatabase::create_in_memory(template()).unwrap();
    let rows: Vec<ImageRow> = [("A", "a.jpg"), ("A/B", "b.jpg"), ("AB", "ab.jpg"), ("C", "c.jpg")]
        .iter()
        .enumerate()
        .map(|(i, (rp, file))| {
            let mut row = ImageRow::for_new_file(0, "Site", rp, file);
            let taken = Utc.with_ymd_and_hms(2021, 3, 1 + i as u32, 12, 0, 0).unwrap();
            row.set_date_time_offset(taken, Duration::zero()).unwrap();
            row
        })
        .collect();
    assert_eq!(db.insert_files(&rows), 4);
    db
}

fn selected_files(db: &FileDatabase<SqliteDatabase>, selection: &CustomSelection) -> Vec<String> {
    db.select_files(selection, &SortTerms::default()).iter().map(|f| f.file()).collect()
}

fn matched_in_memory(db: &FileDatabase<SqliteDatabase>, selection: &CustomSelection) -> Vec<String> {
    let predicate = selection.get_files_predicate();
    let everything = db.select_files(&CustomSelection::new(db.template(), LogicalOperator::And), &SortTerms::default());
    everything
        .iter()
        .filter(|f| predicate.matches(f.data_row()))
        .map(|f| f.file())
        .collect()
}

#[test]
fn test_relative_path_selects_folder_and_descendants() {
    let db = populated();
    let mut selection = db.custom_selection(LogicalOperator::And);
    selection.set_relative_path_search_term("A");
    assert_eq!(selected_files(&db, &selection), vec!["a.jpg", "b.jpg"]);
    assert_eq!(matched_in_memory(&db, &selection), vec!["a.jpg", "b.jpg"]);
}

#[test]
fn test_relative_path_not_equal_excludes_subtree() {
    let db = populated();
    let mut selection = db.custom_selection(LogicalOperator::And);
    selection.set_search_term("RelativePath", Operator::NotEqual, "A");
    assert_eq!(selected_files(&db, &selection), vec!["ab.jpg", "c.jpg"]);
    assert_eq!(matched_in_memory(&db, &selection), vec!["ab.jpg", "c.jpg"]);
}

#[test]
fn test_date_range_stays_conjunctive_under_or() {
    let db = populated();
    let mut selection = db.custom_selection(LogicalOperator::Or);
    let lower = Utc.with_ymd_and_hms(2021, 3, 2, 0, 0, 0).unwrap();
    let upper = Utc.with_ymd_and_hms(2021, 3, 3, 23, 59, 59).unwrap();
    selection.set_date_time_range(&lower, &upper).unwrap();
    selection.set_search_term("File", Operator::Equal, "c.jpg");

    let sql = selection.get_files_where();
    assert!(sql.starts_with("WHERE (File = 'c.jpg' OR (DateTime >= "), "{}", sql);
    assert!(sql.contains(" AND DateTime <= "), "{}", sql);
    assert_eq!(selected_files(&db, &selection), vec!["b.jpg", "ab.jpg", "c.jpg"]);
    assert_eq!(matched_in_memory(&db, &selection), vec!["b.jpg", "ab.jpg", "c.jpg"]);
}

#[test]
fn test_empty_equal_matches_null_and_empty() {
    let db = populated();
    let mut all = db.select_files(&db.custom_selection(LogicalOperator::And), &SortTerms::default());
    let first = all.ids()[0];
    let row = all.find_mut(first).unwrap();
    row.set_value(db.schema(), "Species", "Fox").unwrap();
    assert_eq!(db.update_file(row), 1);

    let mut selection = db.custom_selection(LogicalOperator::And);
    selection.set_search_term("Species", Operator::Equal, "");
    assert_eq!(selection.get_files_where(), "WHERE (Species IS NULL OR Species = '')");
    assert_eq!(selected_files(&db, &selection), vec!["b.jpg", "ab.jpg", "c.jpg"]);
    assert_eq!(matched_in_memory(&db, &selection), vec!["b.jpg", "ab.jpg", "c.jpg"]);
}

#[test]
fn test_quality_shortcut_against_rows() {
    let db = populated();
    let mut all = db.select_files(&db.custom_selection(LogicalOperator::And), &SortTerms::default());
    let last = *all.ids().last().unwrap();
    let row = all.find_mut(last).unwrap();
    row.set_image_quality(ImageQuality::Dark);
    assert_eq!(db.update_file(row), 1);

    let mut selection = db.custom_selection(LogicalOperator::And);
    selection.set_custom_search_from_selection(FileSelection::Dark, None).unwrap();
    assert_eq!(selected_files(&db, &selection), vec!["c.jpg"]);
    assert_eq!(db.count_files(&selection), 1);

    selection.set_custom_search_from_selection(FileSelection::Ok, None).unwrap();
    assert_eq!(db.count_files(&selection), 3);
}

#[test]
fn test_counter_compares_numerically() {
    let db = populated();
    let mut all = db.select_files(&db.custom_selection(LogicalOperator::And), &SortTerms::default());
    for (id, count) in all.ids().into_iter().zip(["2", "10", "9", "0"]) {
        let row = all.find_mut(id).unwrap();
        row.set_value(db.schema(), "Deer", count).unwrap();
        db.update_file(row);
    }

    let mut selection = db.custom_selection(LogicalOperator::And);
    selection.set_search_term("Deer", Operator::Greater, "5");
    assert_eq!(selected_files(&db, &selection), vec!["b.jpg", "ab.jpg"]);
    assert_eq!(matched_in_memory(&db, &selection), vec!["b.jpg", "ab.jpg"]);
}

#[test]
fn test_detections_select_by_best_confidence() {
    let db = populated();
    let ids = db.select_files(&db.custom_selection(LogicalOperator::And), &SortTerms::default()).ids();
    db.insert_detection(ids[0], "1", 0.95, "0.1,0.1,0.2,0.2");
    db.insert_detection(ids[0], "1", 0.40, "0.5,0.5,0.2,0.2");
    db.insert_detection(ids[1], "1", 0.30, "0.1,0.1,0.2,0.2");
    db.insert_detection(ids[2], "2", 0.90, "0.1,0.1,0.2,0.2");

    let mut selection = db.custom_selection(LogicalOperator::And);
    let detections = selection.detection_selections.as_mut().unwrap();
    detections.enabled = true;
    assert_eq!(selected_files(&db, &selection), vec!["a.jpg"]);

    let detections = selection.detection_selections.as_mut().unwrap();
    detections.all_detections = true;
    assert_eq!(selected_files(&db, &selection), vec!["a.jpg", "ab.jpg"]);

    let detections = selection.detection_selections.as_mut().unwrap();
    detections.confidence_low = 0.5;
    detections.confidence_high = 0.0;
    assert_eq!(selected_files(&db, &selection), vec!["b.jpg"]);

    let detections = selection.detection_selections.as_mut().unwrap();
    detections.show_missing_detections = true;
    assert_eq!(selected_files(&db, &selection), vec!["c.jpg"]);
}

#[test]
fn test_rank_by_confidence_lists_each_file_once() {
    let db = populated();
    let ids = db.select_files(&db.custom_selection(LogicalOperator::And), &SortTerms::default()).ids();
    db.insert_detection(ids[0], "1", 0.60, "");
    db.insert_detection(ids[1], "1", 0.99, "");
    db.insert_detection(ids[0], "1", 0.85, "");

    let mut selection = db.custom_selection(LogicalOperator::And);
    let detections = selection.detection_selections.as_mut().unwrap();
    detections.enabled = true;
    detections.rank_by_confidence = true;
    assert_eq!(selected_files(&db, &selection), vec!["b.jpg", "a.jpg"]);
}

#[test]
fn test_sort_terms_order_results() {
    let db = populated();
    let selection = db.custom_selection(LogicalOperator::And);
    let terms = SortTerms::get_sort_terms(selection.search_terms());
    let date_time = terms.iter().find(|t| t.data_label == "DateTime").unwrap().clone();
    let descending = SortTerms {
        primary: SortTerm { is_ascending: false, ..date_time },
        secondary: None,
    };
    let files: Vec<String> = db.select_files(&selection, &descending).iter().map(|f| f.file()).collect();
    assert_eq!(files, vec!["c.jpg", "ab.jpg", "b.jpg", "a.jpg"]);
}

#[test]
fn test_stored_sort_on_missing_field_uses_default_order() {
    let db = populated();
    let selection = db.custom_selection(LogicalOperator::And);
    let default_order = selected_files(&db, &selection);
    assert_eq!(default_order, vec!["a.jpg", "b.jpg", "ab.jpg", "c.jpg"]);

    let mut session = db.image_set().unwrap();
    session.set_sort_terms(&SortTerms::from_persisted_string("Gone,Gone,Note,true,,,,"));
    db.save_image_set(&session);
    let stale = db.image_set().unwrap().sort_terms();
    assert_eq!(stale.primary.data_label, "Gone");
    let files: Vec<String> = db.select_files(&selection, &stale).iter().map(|f| f.file()).collect();
    assert_eq!(files, default_order);

    let injected = SortTerms::from_persisted_string("(SELECT COUNT(*) FROM TemplateTable),x,Note,true,,,,");
    assert_eq!(injected, SortTerms::get_default_sort_terms());
    assert_eq!(db.select_files(&selection, &injected).len(), 4);
}

#[test]
fn test_glob_agrees_between_sql_and_memory() {
    let db = populated();
    let cases: [(&str, &[&str]); 6] = [
        ("a**", &["a.jpg", "ab.jpg"]),
        ("[^a]*", &["b.jpg", "c.jpg"]),
        ("[a-b]*.jpg", &["a.jpg", "b.jpg", "ab.jpg"]),
        ("?.jpg", &["a.jpg", "b.jpg", "c.jpg"]),
        ("*[!]*", &[]),
        ("[ab", &[]),
    ];
    for (pattern, expected) in cases {
        let mut selection = db.custom_selection(LogicalOperator::And);
        assert!(selection.set_search_term("File", Operator::Glob, pattern));
        assert_eq!(selected_files(&db, &selection), expected.to_vec(), "SQL {}", pattern);
        assert_eq!(matched_in_memory(&db, &selection), expected.to_vec(), "memory {}", pattern);
    }
}
