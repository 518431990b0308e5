// File row: one image or video in the data table

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

use crate::constants::*;
use crate::data::column_tuple::ColumnTuplesWithWhere;
use crate::data::row::{DataRow, DataRowBackedObject};
use crate::data::schema::TableSchema;
use crate::data::value::{validate_utc_offset, FieldValue};
use crate::error::{Result, TimelapseError};
use crate::metadata::MetadataReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageQuality {
    Ok,
    Dark,
    Missing,
    Corrupted,
}

impl ImageQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageQuality::Ok => IMAGE_QUALITY_CHOICES[0],
            ImageQuality::Dark => IMAGE_QUALITY_CHOICES[1],
            ImageQuality::Missing => IMAGE_QUALITY_CHOICES[2],
            ImageQuality::Corrupted => IMAGE_QUALITY_CHOICES[3],
        }
    }
}

impl fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageQuality {
    type Err = TimelapseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Ok" => Ok(ImageQuality::Ok),
            "Dark" => Ok(ImageQuality::Dark),
            "Missing" => Ok(ImageQuality::Missing),
            "Corrupted" => Ok(ImageQuality::Corrupted),
            _ => Err(TimelapseError::InvalidArgument(format!("'{}' is not an image quality", s))),
        }
    }
}

/// Still image or video, decided from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Video,
}

impl FileKind {
    pub fn from_file_name(file: &str) -> Self {
        let ext = Path::new(file)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Video
        } else {
            FileKind::Image
        }
    }

    fn is_displayable(&self, path: &Path) -> bool {
        match self {
            FileKind::Image => read_bitmap_format(path).is_some(),
            FileKind::Video => path.is_file(),
        }
    }

    fn load(&self, path: &Path) -> MediaSource {
        if !path.is_file() {
            return MediaSource::Placeholder(PlaceholderReason::FileMissing);
        }
        match self {
            FileKind::Video => MediaSource::Video { path: path.to_path_buf() },
            FileKind::Image => match read_bitmap_format(path) {
                Some(format) => MediaSource::Bitmap { path: path.to_path_buf(), format },
                None => MediaSource::Placeholder(PlaceholderReason::NotABitmap),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapFormat {
    Jpeg,
    Png,
    Bmp,
    Gif,
    Tiff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderReason {
    FileMissing,
    NotABitmap,
}

/// What a viewer should show for a file. Decoding is left to the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Bitmap { path: PathBuf, format: BitmapFormat },
    Video { path: PathBuf },
    Placeholder(PlaceholderReason),
}

/// Display capabilities shared by image and video rows.
pub trait FileCapability {
    fn is_displayable(&self, root: &Path) -> bool;

    fn load(&self, root: &Path) -> MediaSource;
}

/// Sniff the first bytes of a file for a known bitmap signature.
fn read_bitmap_format(path: &Path) -> Option<BitmapFormat> {
    let mut header = [0u8; 8];
    let mut file = fs::File::open(path).ok()?;
    let n = file.read(&mut header).ok()?;
    let header = &header[..n];
    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(BitmapFormat::Jpeg)
    } else if header.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some(BitmapFormat::Png)
    } else if header.starts_with(b"BM") {
        Some(BitmapFormat::Bmp)
    } else if header.starts_with(b"GIF8") {
        Some(BitmapFormat::Gif)
    } else if header.starts_with(b"II*\0") || header.starts_with(b"MM\0*") {
        Some(BitmapFormat::Tiff)
    } else {
        None
    }
}

/// Outcome of comparing a file's stored date/time with its embedded metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeAdjustment {
    /// The file carries no capture time.
    MetadataNotUsed,
    SameFileAndMetadataTime,
    MetadataDateUsed,
    MetadataTimeUsed,
    MetadataDateAndTimeUsed,
    /// Metadata differs by exactly one hour, read as a daylight saving mismatch.
    DaylightSavingOneHour,
    /// The metadata could not be read at all.
    MetadataUnreadable,
}

impl DateTimeAdjustment {
    /// Whether the row's date/time was rewritten from metadata.
    pub fn is_adjusted(&self) -> bool {
        matches!(
            self,
            DateTimeAdjustment::MetadataDateUsed
                | DateTimeAdjustment::MetadataTimeUsed
                | DateTimeAdjustment::MetadataDateAndTimeUsed
                | DateTimeAdjustment::DaylightSavingOneHour
        )
    }
}

/// Classify a stored local time against a metadata local time.
pub fn classify_date_time_adjustment(stored: Option<NaiveDateTime>, metadata: NaiveDateTime) -> DateTimeAdjustment {
    let stored = match stored {
        Some(stored) => stored,
        None => return DateTimeAdjustment::MetadataDateAndTimeUsed,
    };
    if stored == metadata {
        return DateTimeAdjustment::SameFileAndMetadataTime;
    }
    let delta = metadata.signed_duration_since(stored);
    if delta.num_seconds().abs() == DAYLIGHT_SAVING_DELTA_MINUTES * 60 {
        return DateTimeAdjustment::DaylightSavingOneHour;
    }
    match (stored.date() == metadata.date(), stored.time() == metadata.time()) {
        (true, _) => DateTimeAdjustment::MetadataTimeUsed,
        (false, true) => DateTimeAdjustment::MetadataDateUsed,
        (false, false) => DateTimeAdjustment::MetadataDateAndTimeUsed,
    }
}

/// A data table row describing one image or video file.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRow {
    row: DataRow,
    kind: FileKind,
}

impl ImageRow {
    pub fn new(row: DataRow) -> Self {
        let kind = FileKind::from_file_name(&row.get_string(COLUMN_FILE));
        ImageRow { row, kind }
    }

    /// A fresh row for a newly scanned file, with stock defaults filled in.
    pub fn for_new_file(id: i64, folder: &str, relative_path: &str, file: &str) -> Self {
        let mut row = DataRow::new(id);
        row.set(COLUMN_FILE, FieldValue::Text(file.to_string()));
        row.set(COLUMN_RELATIVE_PATH, FieldValue::Text(relative_path.to_string()));
        row.set(COLUMN_FOLDER, FieldValue::Text(folder.to_string()));
        row.set(COLUMN_IMAGE_QUALITY, FieldValue::Text(ImageQuality::Ok.to_string()));
        row.set(COLUMN_DELETE_FLAG, FieldValue::Bool(false));
        row.set(COLUMN_UTC_OFFSET, FieldValue::UtcOffset(Duration::zero()));
        ImageRow::new(row)
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn is_video(&self) -> bool {
        self.kind == FileKind::Video
    }

    pub fn file(&self) -> String {
        self.row.get_string(COLUMN_FILE)
    }

    pub fn relative_path(&self) -> String {
        self.row.get_string(COLUMN_RELATIVE_PATH)
    }

    pub fn folder(&self) -> String {
        self.row.get_string(COLUMN_FOLDER)
    }

    /// Display date, e.g. "04-Mar-2021".
    pub fn date(&self) -> String {
        self.row.get_string(COLUMN_DATE)
    }

    /// Display time, e.g. "05:06:07".
    pub fn time(&self) -> String {
        self.row.get_string(COLUMN_TIME)
    }

    pub fn date_time(&self) -> Option<DateTime<Utc>> {
        self.row.get(COLUMN_DATE_TIME).and_then(|v| v.as_date_time())
    }

    /// Zero when unset.
    pub fn utc_offset(&self) -> Duration {
        self.row
            .get(COLUMN_UTC_OFFSET)
            .and_then(|v| v.as_utc_offset())
            .unwrap_or_else(Duration::zero)
    }

    /// Wall clock time at the camera.
    pub fn local_date_time(&self) -> Option<NaiveDateTime> {
        self.date_time().map(|dt| dt.naive_utc() + self.utc_offset())
    }

    /// `None` when the stored text is not one of the known qualities.
    pub fn image_quality(&self) -> Option<ImageQuality> {
        self.row.get_string(COLUMN_IMAGE_QUALITY).parse().ok()
    }

    pub fn delete_flag(&self) -> bool {
        self.row
            .get(COLUMN_DELETE_FLAG)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn set_image_quality(&mut self, quality: ImageQuality) {
        self.row.set(COLUMN_IMAGE_QUALITY, FieldValue::Text(quality.to_string()));
    }

    pub fn set_delete_flag(&mut self, flag: bool) {
        self.row.set(COLUMN_DELETE_FLAG, FieldValue::Bool(flag));
    }

    pub fn set_file(&mut self, file: &str) {
        self.row.set(COLUMN_FILE, FieldValue::Text(file.to_string()));
        self.kind = FileKind::from_file_name(file);
    }

    pub fn set_relative_path(&mut self, relative_path: &str) {
        self.row.set(COLUMN_RELATIVE_PATH, FieldValue::Text(relative_path.to_string()));
    }

    /// Set DateTime and UtcOffset together and rewrite the display Date and
    /// Time in local time so all four stay consistent.
    pub fn set_date_time_offset(&mut self, date_time: DateTime<Utc>, offset: Duration) -> Result<()> {
        validate_utc_offset(offset)?;
        let local = date_time.naive_utc() + offset;
        self.row.set(COLUMN_DATE_TIME, FieldValue::DateTimeUtc(date_time));
        self.row.set(COLUMN_UTC_OFFSET, FieldValue::UtcOffset(offset));
        self.row.set(COLUMN_DATE, FieldValue::Text(local.format(DATE_DISPLAY_FORMAT).to_string()));
        self.row.set(COLUMN_TIME, FieldValue::Text(local.format(TIME_DISPLAY_FORMAT).to_string()));
        Ok(())
    }

    pub fn value(&self, data_label: &str) -> Option<&FieldValue> {
        self.row.get(data_label)
    }

    /// Set a template field from its canonical string, validated by the column.
    pub fn set_value(&mut self, schema: &TableSchema, data_label: &str, raw: &str) -> Result<()> {
        if data_label == COLUMN_ID {
            return Err(TimelapseError::InvalidArgument("the Id column is read-only".to_string()));
        }
        let value = schema.parse_value(data_label, raw)?;
        self.row.set(data_label, value);
        if data_label == COLUMN_FILE {
            self.kind = FileKind::from_file_name(raw);
        }
        Ok(())
    }

    /// Path of the file relative to the image set root.
    pub fn relative_file_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for part in self.relative_path().split(PATH_DB_SEPARATOR).filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path.push(self.file());
        path
    }

    pub fn full_path(&self, root: &Path) -> PathBuf {
        root.join(self.relative_file_path())
    }

    /// Compare the stored date/time with the file's embedded capture time and
    /// adopt the metadata when they disagree. The UTC offset is kept.
    pub fn reconcile_date_time(&mut self, root: &Path, reader: &dyn MetadataReader) -> DateTimeAdjustment {
        let path = self.full_path(root);
        let metadata = match reader.read_date_time_original(&path) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => return DateTimeAdjustment::MetadataNotUsed,
            Err(e) => {
                log::warn!("Could not read metadata from {}: {}", path.display(), e);
                return DateTimeAdjustment::MetadataUnreadable;
            }
        };

        let adjustment = classify_date_time_adjustment(self.local_date_time(), metadata);
        if adjustment.is_adjusted() {
            let offset = self.utc_offset();
            let utc = Utc.from_utc_datetime(&(metadata - offset));
            if let Err(e) = self.set_date_time_offset(utc, offset) {
                log::warn!("Row {}: could not apply metadata date: {}", self.id(), e);
                return DateTimeAdjustment::MetadataNotUsed;
            }
        }
        adjustment
    }

    /// Move the backing file into `<relative path>/DeletedFiles`. When a file
    /// of that name is already there the source is deleted instead. Failures
    /// are logged and reported as `false`.
    pub fn try_move_to_deleted_folder(&self, root: &Path) -> bool {
        let source = self.full_path(root);
        if !source.is_file() {
            log::warn!("Cannot soft delete {}: file not found", source.display());
            return false;
        }

        let mut deleted_dir = root.to_path_buf();
        for part in self.relative_path().split(PATH_DB_SEPARATOR).filter(|p| !p.is_empty()) {
            deleted_dir.push(part);
        }
        deleted_dir.push(DELETED_FILES_FOLDER);
        if let Err(e) = fs::create_dir_all(&deleted_dir) {
            log::warn!("Cannot create {}: {}", deleted_dir.display(), e);
            return false;
        }

        let target = deleted_dir.join(self.file());
        if target.exists() {
            return match fs::remove_file(&source) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("Cannot delete {}: {}", source.display(), e);
                    false
                }
            };
        }

        match move_file(&source, &target) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Cannot move {} to {}: {}", source.display(), target.display(), e);
                false
            }
        }
    }
}

/// Rename, falling back to copy plus remove across volumes. The copy keeps
/// the original modification time.
fn move_file(source: &Path, target: &Path) -> std::io::Result<()> {
    if fs::rename(source, target).is_ok() {
        return Ok(());
    }
    fs::copy(source, target)?;
    if let Ok(modified) = fs::metadata(source).and_then(|m| m.modified()) {
        let _ = filetime::set_file_mtime(target, filetime::FileTime::from_system_time(modified));
    }
    fs::remove_file(source)
}

impl DataRowBackedObject for ImageRow {
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

impl FileCapability for ImageRow {
    fn is_displayable(&self, root: &Path) -> bool {
        self.kind.is_displayable(&self.full_path(root))
    }

    fn load(&self, root: &Path) -> MediaSource {
        self.kind.load(&self.full_path(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::{ControlType, FieldDescriptor, Template};
    use chrono::NaiveDate;
    use std::cell::RefCell;

    struct FixedReader(RefCell<Option<Result<Option<NaiveDateTime>>>>);

    impl MetadataReader for FixedReader {
        fn read_date_time_original(&self, _path: &Path) -> Result<Option<NaiveDateTime>> {
            self.0.borrow_mut().take().unwrap_or(Ok(None))
        }
    }

    fn reader(value: Result<Option<NaiveDateTime>>) -> FixedReader {
        FixedReader(RefCell::new(Some(value)))
    }

    fn naive(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d).unwrap().and_hms_opt(h, mi, s).unwrap()
    }

    fn row_at(local: NaiveDateTime, offset_hours: i64) -> ImageRow {
        let mut row = ImageRow::for_new_file(1, "Site", "cam1", "IMG_0001.JPG");
        let offset = Duration::hours(offset_hours);
        let utc = Utc.from_utc_datetime(&(local - offset));
        row.set_date_time_offset(utc, offset).unwrap();
        row
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(FileKind::from_file_name("a.JPG"), FileKind::Image);
        assert_eq!(FileKind::from_file_name("clip.Mp4"), FileKind::Video);
        assert_eq!(FileKind::from_file_name("noext"), FileKind::Image);
    }

    #[test]
    fn test_date_time_offset_keeps_display_fields_local() {
        let row = row_at(naive(2021, 3, 4, 23, 30, 0), -7);
        assert_eq!(row.date(), "04-Mar-2021");
        assert_eq!(row.time(), "23:30:00");
        assert_eq!(row.date_time().unwrap(), Utc.with_ymd_and_hms(2021, 3, 5, 6, 30, 0).unwrap());
        assert_eq!(row.utc_offset(), Duration::hours(-7));
    }

    #[test]
    fn test_classification_same_and_one_hour() {
        let stored = naive(2020, 6, 1, 10, 0, 0);
        assert_eq!(
            classify_date_time_adjustment(Some(stored), stored),
            DateTimeAdjustment::SameFileAndMetadataTime
        );
        assert_eq!(
            classify_date_time_adjustment(Some(stored), naive(2020, 6, 1, 11, 0, 0)),
            DateTimeAdjustment::DaylightSavingOneHour
        );
        // Crosses midnight, so date and time both change, but one hour wins
        assert_eq!(
            classify_date_time_adjustment(Some(naive(2020, 6, 1, 23, 30, 0)), naive(2020, 6, 2, 0, 30, 0)),
            DateTimeAdjustment::DaylightSavingOneHour
        );
        assert_eq!(
            classify_date_time_adjustment(Some(stored), naive(2020, 6, 1, 10, 5, 0)),
            DateTimeAdjustment::MetadataTimeUsed
        );
        assert_eq!(
            classify_date_time_adjustment(Some(stored), naive(2020, 7, 1, 10, 0, 0)),
            DateTimeAdjustment::MetadataDateUsed
        );
        assert_eq!(
            classify_date_time_adjustment(Some(stored), naive(2019, 1, 2, 3, 4, 5)),
            DateTimeAdjustment::MetadataDateAndTimeUsed
        );
    }

    #[test]
    fn test_reconcile_rewrites_date_time() {
        let dir = tempfile::tempdir().unwrap();
        let mut row = row_at(naive(2020, 6, 1, 10, 0, 0), 2);
        let result = row.reconcile_date_time(dir.path(), &reader(Ok(Some(naive(2020, 6, 1, 11, 0, 0)))));
        assert_eq!(result, DateTimeAdjustment::DaylightSavingOneHour);
        assert_eq!(row.time(), "11:00:00");
        assert_eq!(row.utc_offset(), Duration::hours(2));
        assert_eq!(row.date_time().unwrap(), Utc.with_ymd_and_hms(2020, 6, 1, 9, 0, 0).unwrap());

        let same = row.reconcile_date_time(dir.path(), &reader(Ok(Some(naive(2020, 6, 1, 11, 0, 0)))));
        assert_eq!(same, DateTimeAdjustment::SameFileAndMetadataTime);
    }

    #[test]
    fn test_reconcile_unreadable_and_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut row = row_at(naive(2020, 6, 1, 10, 0, 0), 0);
        let failed = reader(Err(TimelapseError::ExifTool("not found".to_string())));
        assert_eq!(row.reconcile_date_time(dir.path(), &failed), DateTimeAdjustment::MetadataUnreadable);
        assert_eq!(row.reconcile_date_time(dir.path(), &reader(Ok(None))), DateTimeAdjustment::MetadataNotUsed);
        assert_eq!(row.time(), "10:00:00");
    }

    #[test]
    fn test_soft_delete_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("cam1")).unwrap();
        fs::write(dir.path().join("cam1").join("IMG_0001.JPG"), b"\xFF\xD8\xFFdata").unwrap();
        let row = ImageRow::for_new_file(1, "Site", "cam1", "IMG_0001.JPG");

        assert!(row.try_move_to_deleted_folder(dir.path()));
        assert!(!dir.path().join("cam1/IMG_0001.JPG").exists());
        assert!(dir.path().join("cam1/DeletedFiles/IMG_0001.JPG").exists());
        // Source is gone now
        assert!(!row.try_move_to_deleted_folder(dir.path()));
    }

    #[test]
    fn test_soft_delete_with_existing_target_deletes_source() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("DeletedFiles")).unwrap();
        fs::write(dir.path().join("DeletedFiles").join("a.jpg"), b"old").unwrap();
        fs::write(dir.path().join("a.jpg"), b"new").unwrap();
        let row = ImageRow::for_new_file(2, "Site", "", "a.jpg");

        assert!(row.try_move_to_deleted_folder(dir.path()));
        assert!(!dir.path().join("a.jpg").exists());
        assert_eq!(fs::read(dir.path().join("DeletedFiles/a.jpg")).unwrap(), b"old");
    }

    #[test]
    fn test_displayability_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.png"), b"\x89PNG\r\n\x1a\nrest").unwrap();
        fs::write(dir.path().join("bad.jpg"), b"not an image").unwrap();
        fs::write(dir.path().join("clip.mp4"), b"whatever").unwrap();

        let good = ImageRow::for_new_file(1, "", "", "good.png");
        let bad = ImageRow::for_new_file(2, "", "", "bad.jpg");
        let clip = ImageRow::for_new_file(3, "", "", "clip.mp4");
        let gone = ImageRow::for_new_file(4, "", "", "gone.avi");

        assert!(good.is_displayable(dir.path()));
        assert!(!bad.is_displayable(dir.path()));
        assert!(clip.is_displayable(dir.path()));
        assert!(!gone.is_displayable(dir.path()));
        assert!(matches!(good.load(dir.path()), MediaSource::Bitmap { format: BitmapFormat::Png, .. }));
        assert_eq!(bad.load(dir.path()), MediaSource::Placeholder(PlaceholderReason::NotABitmap));
        assert!(matches!(clip.load(dir.path()), MediaSource::Video { .. }));
        assert_eq!(gone.load(dir.path()), MediaSource::Placeholder(PlaceholderReason::FileMissing));
    }

    #[test]
    fn test_column_tuples_round_trip() {
        let template = Template::with_user_controls(vec![FieldDescriptor::new("Deer", ControlType::Counter)]).unwrap();
        let schema = TableSchema::from_template(&template);
        let mut row = row_at(naive(2020, 6, 1, 10, 0, 0), 5);
        row.set_value(&schema, "Deer", "3").unwrap();
        assert!(row.set_value(&schema, "Deer", "three").is_err());
        row.set_delete_flag(true);

        let batch = row.create_column_tuples_with_where_by_id().unwrap();
        assert_eq!(batch.where_sql(), "Id = 1");
        for tuple in batch.columns() {
            let reparsed = schema.parse_value(&tuple.name, &tuple.value).unwrap();
            assert_eq!(Some(&reparsed), row.value(&tuple.name), "column {}", tuple.name);
        }
    }
}
