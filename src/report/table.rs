use crate::analyze::{AggregateRow, Value, ValueKind, PROJECT_COLUMN};
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("column `{column}` holds both {first:?} and {second:?} values")]
    KindConflict {
        column: String,
        first: ValueKind,
        second: ValueKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ValueKind,
}

/// Wide table over all projects: the union of every row's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

// Create
impl Table {
    /// Builds the table once every row is in. Rows are ordered by project name,
    /// then by row key, before the union is taken, so the result does not
    /// depend on the order the rows arrived in.
    pub fn from_rows(mut rows: Vec<AggregateRow>) -> Result<Self, TableError> {
        rows.sort_by(|a, b| (a.project(), a.key()).cmp(&(b.project(), b.key())));

        let mut kinds = IndexMap::new();
        kinds.insert(PROJECT_COLUMN.to_string(), ValueKind::Text);
        for row in &rows {
            for (name, value) in row.cells() {
                match kinds.get(name) {
                    Some(kind) if *kind != value.kind() => {
                        return Err(TableError::KindConflict {
                            column: name.to_string(),
                            first: *kind,
                            second: value.kind(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        kinds.insert(name.to_string(), value.kind());
                    }
                }
            }
        }

        let rows = rows
            .iter()
            .map(|row| {
                kinds
                    .iter()
                    .map(|(name, kind)| row.get(name).cloned().unwrap_or_else(|| kind.absent()))
                    .collect()
            })
            .collect();
        let columns = kinds
            .into_iter()
            .map(|(name, kind)| Column { name, kind })
            .collect();
        Ok(Self { columns, rows })
    }
}

impl Table {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().filter_map(|row| match row.first() {
            Some(Value::Text(Some(project))) => Some(project.as_str()),
            _ => None,
        })
    }

    pub fn get(&self, project: &str, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows
            .iter()
            .find(|row| matches!(row.first(), Some(Value::Text(Some(name))) if name == project))
            .and_then(|row| row.get(index))
    }

    pub fn count(&self, project: &str, column: &str) -> Option<u64> {
        match self.get(project, column)? {
            Value::Count(count) => Some(*count),
            _ => None,
        }
    }
}
