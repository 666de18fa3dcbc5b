//! Views: the relation type every operator consumes and produces.
//!
//! A [`View`] is a table plus two trailing bookkeeping columns:
//!
//! - [`VALID_COL_NAME`], a 1-bit share marking rows that hold real data. Operators that drop
//!   rows clear this bit and then compact the view (see [`View::clear_invalid_entries`]).
//! - [`PADDING_COL_NAME`], a public flag marking dummy rows that the sort network appends to
//!   reach a power-of-two length. Both parties hold the same value, padding rows never
//!   survive an operator, so outside the sort this column is all zeros.
//!
//! Operators take a view by value and return a new one. The rows of a view have no identity
//! beyond their position, which every operator is free to change.

use crate::{
    Error,
    share::{Party, Share},
    table::{BUCKET_TAG_PREFIX, Field, Table, check_schema},
};

/// Name of the validity column.
pub const VALID_COL_NAME: &str = "$valid";
/// Name of the padding column.
pub const PADDING_COL_NAME: &str = "$padding";

/// Renames `field` of `table` to `table.field`, keeping the bucket-tag prefix in front.
pub(crate) fn prefixed(table: &str, field: &str) -> String {
    match field.strip_prefix(BUCKET_TAG_PREFIX) {
        Some(key) => format!("{BUCKET_TAG_PREFIX}{table}.{key}"),
        None => format!("{table}.{field}"),
    }
}

/// One party's shares of a relation, plus validity and padding columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    name: String,
    fields: Vec<Field>,
    columns: Vec<Vec<Share>>,
}

impl View {
    /// A view of all columns of `table`, with every row valid.
    pub fn from_table(table: Table, party: Party) -> View {
        let (name, fields, columns) = table.into_parts();
        let rows = columns.first().map_or(0, Vec::len);
        View::from_data(name, fields, columns, vec![party.constant(1); rows])
    }

    /// Like [`View::from_table`], but every field is renamed to `table.field`.
    pub fn from_table_with_prefix(table: Table, party: Party) -> View {
        let (name, fields, columns) = table.into_parts();
        let rows = columns.first().map_or(0, Vec::len);
        let fields = fields
            .into_iter()
            .map(|f| Field::new(prefixed(&name, &f.name), f.width))
            .collect();
        View::from_data(name, fields, columns, vec![party.constant(1); rows])
    }

    /// A view of the named columns of `table`, in the given order, with every row valid.
    pub fn select_columns(table: &Table, names: &[&str], party: Party) -> Result<View, Error> {
        let mut fields = Vec::with_capacity(names.len());
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let index = table
                .col_index(name)
                .ok_or_else(|| Error::UnknownField(name.to_string()))?;
            fields.push(table.fields()[index].clone());
            columns.push(table.col(index).to_vec());
        }
        check_schema(&fields)?;
        let valid = vec![party.constant(1); table.row_num()];
        Ok(View::from_data(
            table.name().to_string(),
            fields,
            columns,
            valid,
        ))
    }

    /// Assembles a view from data columns and a validity column, without padding.
    pub(crate) fn from_data(
        name: String,
        mut fields: Vec<Field>,
        mut columns: Vec<Vec<Share>>,
        valid: Vec<Share>,
    ) -> View {
        let rows = valid.len();
        fields.push(Field::new(VALID_COL_NAME, 1));
        fields.push(Field::new(PADDING_COL_NAME, 1));
        columns.push(valid);
        columns.push(vec![Share(0); rows]);
        View {
            name,
            fields,
            columns,
        }
    }

    /// A view with the same schema and the given columns (including validity and padding).
    pub(crate) fn with_columns(&self, columns: Vec<Vec<Share>>) -> View {
        View {
            name: self.name.clone(),
            fields: self.fields.clone(),
            columns,
        }
    }

    /// A view with the same schema and no rows.
    pub(crate) fn empty_like(&self) -> View {
        self.with_columns(vec![vec![]; self.col_num()])
    }

    /// The name of the table the view was derived from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All fields, including the validity and padding columns.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The data fields, without the validity and padding columns.
    pub fn data_fields(&self) -> &[Field] {
        &self.fields[..self.valid_index()]
    }

    /// The column index of the named field.
    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub(crate) fn index_of(&self, name: &str) -> Result<usize, Error> {
        self.col_index(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }

    /// Number of columns, including the validity and padding columns.
    pub fn col_num(&self) -> usize {
        self.fields.len()
    }

    /// Number of rows.
    pub fn row_num(&self) -> usize {
        self.columns[self.valid_index()].len()
    }

    /// The shares of one column, or `None` if there is no column `index`.
    pub fn column(&self, index: usize) -> Option<&[Share]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    pub(crate) fn col(&self, index: usize) -> &[Share] {
        &self.columns[index]
    }

    pub(crate) fn columns(&self) -> &[Vec<Share>] {
        &self.columns
    }

    /// Index of the validity column.
    pub fn valid_index(&self) -> usize {
        self.fields.len() - 2
    }

    /// Index of the padding column.
    pub fn padding_index(&self) -> usize {
        self.fields.len() - 1
    }

    /// The shares of the validity column.
    pub fn valid(&self) -> &[Share] {
        &self.columns[self.valid_index()]
    }

    pub(crate) fn set_valid(&mut self, valid: Vec<Share>) -> Result<(), Error> {
        if valid.len() != self.row_num() {
            return Err(Error::LengthMismatch(valid.len(), self.row_num()));
        }
        let index = self.valid_index();
        self.columns[index] = valid;
        Ok(())
    }

    /// Keeps only the named data columns, in the given order.
    pub fn select(mut self, names: &[&str]) -> Result<View, Error> {
        let mut fields = Vec::with_capacity(names.len() + 2);
        let mut columns = Vec::with_capacity(names.len() + 2);
        for name in names {
            let index = self.index_of(name)?;
            if index >= self.valid_index() {
                return Err(Error::UnknownField(name.to_string()));
            }
            fields.push(self.fields[index].clone());
            columns.push(std::mem::take(&mut self.columns[index]));
        }
        check_schema(&fields)?;
        let valid_index = self.valid_index();
        fields.extend(self.fields.drain(valid_index..));
        columns.extend(self.columns.drain(valid_index..));
        Ok(View {
            name: self.name,
            fields,
            columns,
        })
    }

    /// Appends the rows of `other`, which must have the same fields.
    pub fn concat(mut self, other: View) -> Result<View, Error> {
        if self.fields != other.fields {
            return Err(Error::SchemaMismatch);
        }
        for (column, more) in self.columns.iter_mut().zip(other.columns) {
            column.extend(more);
        }
        Ok(self)
    }

    /// Adds a data column right before the validity column.
    pub(crate) fn push_column(&mut self, field: Field, column: Vec<Share>) -> Result<(), Error> {
        if column.len() != self.row_num() {
            return Err(Error::LengthMismatch(column.len(), self.row_num()));
        }
        if self.col_index(&field.name).is_some() {
            return Err(Error::DuplicateField(field.name));
        }
        check_schema(std::slice::from_ref(&field))?;
        let index = self.valid_index();
        self.fields.insert(index, field);
        self.columns.insert(index, column);
        Ok(())
    }

    pub(crate) fn truncate(&mut self, rows: usize) {
        for column in self.columns.iter_mut() {
            column.truncate(rows);
        }
    }

    /// Appends invalid padding rows until the view has `rows` rows.
    pub(crate) fn pad_to(&mut self, rows: usize) {
        let padding = self.padding_index();
        for (i, column) in self.columns.iter_mut().enumerate() {
            let filler = if i == padding { Share(1) } else { Share(0) };
            column.resize(rows, filler);
        }
    }

    pub(crate) fn is_padding(&self, row: usize) -> bool {
        self.columns[self.padding_index()][row].0 & 1 == 1
    }

    pub(crate) fn swap_rows(&mut self, a: usize, b: usize) {
        for column in self.columns.iter_mut() {
            column.swap(a, b);
        }
    }

    pub(crate) fn set_cell(&mut self, col: usize, row: usize, share: Share) {
        self.columns[col][row] = share;
    }
}
