pub mod csv;
pub mod table;

pub use self::csv::{CsvReport, ExportError, DATE_FORMAT};
pub use self::table::{Column, Table, TableError};
