use crate::analyze::Value;
use crate::report::Table;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to create `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write report: {0}")]
    Write(#[from] io::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
}

pub trait CsvReport {
    /// Writes the report to `path`, creating missing parent directories.
    fn report_create(&self, path: &Path) -> Result<(), ExportError>;

    fn report_write<W: io::Write>(&self, writer: W) -> Result<(), ExportError>;
}

impl CsvReport for Table {
    fn report_create(&self, path: &Path) -> Result<(), ExportError> {
        let io_error = |source| ExportError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let file = fs::File::create(path).map_err(io_error)?;
        self.report_write(file)
    }

    fn report_write<W: io::Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(self.columns().iter().map(|column| column.name.as_str()))?;
        for row in self.rows() {
            writer.write_record(row.iter().map(Value::to_field))?;
        }
        writer.flush()?;
        Ok(())
    }
}

trait FieldExt {
    fn to_field(&self) -> String;
}

impl FieldExt for Value {
    fn to_field(&self) -> String {
        match self {
            Value::Count(count) => count.to_string(),
            Value::Date(Some(date)) => date.format(DATE_FORMAT).to_string(),
            Value::Text(Some(text)) => text.clone(),
            // Whole numbers keep one decimal so the column reads as floating point.
            Value::Number(Some(number)) if number.fract() == 0.0 => format!("{number:.1}"),
            Value::Number(Some(number)) => number.to_string(),
            Value::Flag(Some(flag)) => flag.to_string(),
            Value::Date(None) | Value::Text(None) | Value::Number(None) | Value::Flag(None) => {
                String::new()
            }
        }
    }
}
