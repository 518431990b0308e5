// Row and table data layer

pub mod column_tuple;
pub mod image_row;
pub mod image_set_row;
pub mod marker_row;
pub mod row;
pub mod schema;
pub mod table;
pub mod value;

pub use column_tuple::{ColumnTuple, ColumnTuplesWithWhere};
pub use image_row::{DateTimeAdjustment, FileCapability, FileKind, ImageQuality, ImageRow, MediaSource};
pub use image_set_row::ImageSetRow;
pub use marker_row::{Marker, MarkerRow};
pub use row::{DataRow, DataRowBackedObject};
pub use schema::{ControlType, FieldDescriptor, FileTableColumn, TableSchema, Template};
pub use table::{DataTableBackedList, ListCursor};
pub use value::FieldValue;
