//! Tables: named, fixed-width columns of shares, built by local row insertion.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Error, share::Share};

/// Prefix of the bucket-tag column that carries the hash of a key field.
pub const BUCKET_TAG_PREFIX: &str = "$tag:";
/// Width of bucket-tag columns.
pub const BUCKET_TAG_WIDTH: u32 = 32;

/// A named column of a fixed bit width.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Unique name within its table or view.
    pub name: String,
    /// Width in bits, between 1 and 64.
    pub width: u32,
}

impl Field {
    /// A field of the given name and width.
    pub fn new(name: impl Into<String>, width: u32) -> Self {
        Self {
            name: name.into(),
            width,
        }
    }

    /// Whether this is a bucket-tag column.
    pub fn is_bucket_tag(&self) -> bool {
        self.name.starts_with(BUCKET_TAG_PREFIX)
    }
}

pub(crate) fn check_schema(fields: &[Field]) -> Result<(), Error> {
    let mut names = HashSet::new();
    for field in fields {
        if field.width == 0 || field.width > 64 {
            return Err(Error::InvalidWidth {
                field: field.name.clone(),
                width: field.width,
            });
        }
        if !names.insert(field.name.as_str()) {
            return Err(Error::DuplicateField(field.name.clone()));
        }
    }
    Ok(())
}

/// One party's shares of a relation.
///
/// All columns have the same length. If the table has a key field, the last column is the
/// bucket tag of the key, named [`BUCKET_TAG_PREFIX`] followed by the key field's name. It
/// holds shares of a hash of the key that the data owner computed before sharing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    fields: Vec<Field>,
    columns: Vec<Vec<Share>>,
    key_field: Option<String>,
}

impl Table {
    /// An empty table with the given fields and optional key field.
    pub fn new(name: &str, fields: &[(&str, u32)], key_field: Option<&str>) -> Result<Self, Error> {
        let mut fields: Vec<Field> = fields.iter().map(|(n, w)| Field::new(*n, *w)).collect();
        if let Some(key) = key_field {
            if !fields.iter().any(|f| f.name == key) {
                return Err(Error::UnknownField(key.to_string()));
            }
            fields.push(Field::new(
                format!("{BUCKET_TAG_PREFIX}{key}"),
                BUCKET_TAG_WIDTH,
            ));
        }
        check_schema(&fields)?;
        Ok(Self {
            name: name.to_string(),
            columns: vec![vec![]; fields.len()],
            fields,
            key_field: key_field.map(str::to_string),
        })
    }

    /// Appends a row of shares, one per column (including the bucket tag, if any).
    pub fn insert(&mut self, row: &[Share]) -> Result<(), Error> {
        if row.len() != self.col_num() {
            return Err(Error::RowLength {
                expected: self.col_num(),
                actual: row.len(),
            });
        }
        for (column, share) in self.columns.iter_mut().zip(row) {
            column.push(*share);
        }
        Ok(())
    }

    /// The name of the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fields, in column order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The key field, if the table has one.
    pub fn key_field(&self) -> Option<&str> {
        self.key_field.as_deref()
    }

    /// The column index of the named field.
    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Number of columns.
    pub fn col_num(&self) -> usize {
        self.fields.len()
    }

    /// Number of rows.
    pub fn row_num(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    /// The shares of one column, or `None` if there is no column `index`.
    pub fn column(&self, index: usize) -> Option<&[Share]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    pub(crate) fn col(&self, index: usize) -> &[Share] {
        &self.columns[index]
    }

    pub(crate) fn into_parts(self) -> (String, Vec<Field>, Vec<Vec<Share>>) {
        (self.name, self.fields, self.columns)
    }
}
