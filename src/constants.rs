// Timelapse Constants
// Column names, table names and canonical formats are part of the database file
// format. Changing any of them breaks files written by earlier builds.

pub const VERSION_COMPATIBILITY: &str = "2.2.0.0";

// Stock data table columns
pub const COLUMN_ID: &str = "Id";
pub const COLUMN_FILE: &str = "File";
pub const COLUMN_RELATIVE_PATH: &str = "RelativePath";
pub const COLUMN_FOLDER: &str = "Folder";
pub const COLUMN_DATE: &str = "Date";
pub const COLUMN_TIME: &str = "Time";
pub const COLUMN_DATE_TIME: &str = "DateTime";
pub const COLUMN_UTC_OFFSET: &str = "UtcOffset";
pub const COLUMN_IMAGE_QUALITY: &str = "ImageQuality";
pub const COLUMN_DELETE_FLAG: &str = "DeleteFlag";

// Image set (session) columns
pub const COLUMN_LOG: &str = "Log";
pub const COLUMN_SELECTION: &str = "Selection";
pub const COLUMN_SELECTED_FOLDER: &str = "SelectedFolder";
pub const COLUMN_MOST_RECENT_FILE_ID: &str = "MostRecentFileId";
pub const COLUMN_SORT_TERMS: &str = "SortTerms";
pub const COLUMN_QUICK_PASTE: &str = "QuickPaste";
pub const COLUMN_VERSION_COMPATIBILITY: &str = "VersionCompatibility";

// Tables
pub const TABLE_DATA: &str = "DataTable";
pub const TABLE_IMAGE_SET: &str = "ImageSetTable";
pub const TABLE_MARKERS: &str = "MarkersTable";
pub const TABLE_TEMPLATE: &str = "TemplateTable";
pub const TABLE_DETECTIONS: &str = "Detections";
pub const TABLE_CLASSIFICATIONS: &str = "Classifications";
pub const TABLE_DETECTION_CATEGORIES: &str = "DetectionCategories";
pub const TABLE_CLASSIFICATION_CATEGORIES: &str = "ClassificationCategories";

// Detection / classification columns
pub const DETECTION_ID: &str = "detectionID";
pub const DETECTION_CATEGORY: &str = "category";
pub const DETECTION_CONF: &str = "conf";
pub const DETECTION_BBOX: &str = "bbox";
pub const CATEGORY_LABEL: &str = "label";

// Canonical value tokens
pub const BOOLEAN_TRUE: &str = "true";
pub const BOOLEAN_FALSE: &str = "false";

// Canonical formats (chrono syntax)
pub const DATE_TIME_DATABASE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
pub const DATE_DISPLAY_FORMAT: &str = "%d-%b-%Y";
pub const TIME_DISPLAY_FORMAT: &str = "%H:%M:%S";
pub const EXIF_DATE_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

// UTC offsets
pub const UTC_OFFSET_GRANULARITY_MINUTES: i64 = 15;
pub const MIN_UTC_OFFSET_HOURS: i64 = -12;
pub const MAX_UTC_OFFSET_HOURS: i64 = 14;

// Paths
pub const PATH_DB_SEPARATOR: char = '/';
pub const DELETED_FILES_FOLDER: &str = "DeletedFiles";
pub const DB_FILE_EXTENSION: &str = "ddb";

// Markers
pub const MARKER_POINT_SEPARATOR: char = '|';
pub const MARKER_COORDINATE_SEPARATOR: char = ',';

// Sort terms persist as two quadruples
pub const SORT_TERM_SLOTS: usize = 8;

// Search defaults
pub const DEFAULT_COUNTER_VALUE: &str = "0";
pub const DEFAULT_UTC_OFFSET: &str = "0.00";
pub const IMAGE_QUALITY_CHOICES: [&str; 4] = ["Ok", "Dark", "Missing", "Corrupted"];

// Sort term display labels
pub const SORT_LABEL_ID: &str = "Id (the order files were added)";
pub const SORT_LABEL_FILE: &str = "File name";
pub const SORT_LABEL_RELATIVE_PATH: &str = "Relative path (folder then file name)";
pub const SORT_LABEL_DATE_TIME: &str = "Date and time";

// Video extensions (everything else with an image extension is a still)
pub const VIDEO_EXTENSIONS: [&str; 6] = ["avi", "mp4", "asf", "mov", "wmv", "mkv"];

// Image extensions
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "tiff"];

// Metadata reconciliation: a difference of exactly this many minutes is read
// as a daylight saving mismatch rather than a clock error
pub const DAYLIGHT_SAVING_DELTA_MINUTES: i64 = 60;

// Image set database, next to the image folders
pub const DEFAULT_IMAGE_SET_NAME: &str = "TimelapseData";
