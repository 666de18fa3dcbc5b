//! The data owner's side: sharing plaintext tables and revealing results.
//!
//! Everything here runs on plaintext and outside the protocol. In a deployment the data owner
//! sends one [`Table`] to each party and later receives both parties' result [`View`]s.

use std::fmt;

use rand::Rng;

use crate::{
    Error,
    share::{Share, combine, mask, split},
    table::{BUCKET_TAG_WIDTH, Table},
    view::View,
};

/// The hash of a key that its bucket tag is a sharing of.
///
/// Only the low [`EngineConfig::bucket_bits`](crate::EngineConfig::bucket_bits) bits are used
/// to route rows, so keys collide whenever their hashes agree on those bits.
pub fn bucket_tag(key: u64) -> u64 {
    key.wrapping_mul(31).wrapping_add(17) & mask(BUCKET_TAG_WIDTH)
}

/// Splits plaintext `rows` into one [`Table`] per party.
///
/// Every row has one value per field, and values are truncated to the field's width. With a
/// `key_field`, the bucket tag of the key is computed here and shared as an extra column.
pub fn share_table(
    name: &str,
    fields: &[(&str, u32)],
    key_field: Option<&str>,
    rows: &[Vec<u64>],
    rng: &mut impl Rng,
) -> Result<(Table, Table), Error> {
    let mut t0 = Table::new(name, fields, key_field)?;
    let mut t1 = Table::new(name, fields, key_field)?;
    let key = key_field.and_then(|key| fields.iter().position(|(n, _)| *n == key));
    for row in rows {
        if row.len() != fields.len() {
            return Err(Error::RowLength {
                expected: fields.len(),
                actual: row.len(),
            });
        }
        let mut values: Vec<(u64, u32)> = row
            .iter()
            .zip(fields)
            .map(|(v, (_, width))| (*v, *width))
            .collect();
        if let Some(key) = key {
            values.push((bucket_tag(row[key] & mask(fields[key].1)), BUCKET_TAG_WIDTH));
        }
        let (s0, s1): (Vec<Share>, Vec<Share>) =
            values.iter().map(|(v, w)| split(*v, *w, rng)).unzip();
        t0.insert(&s0)?;
        t1.insert(&s1)?;
    }
    Ok((t0, t1))
}

/// A revealed relation: the valid rows of a view, in plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revealed {
    /// Names of the data fields.
    pub fields: Vec<String>,
    /// The valid rows, one value per field.
    pub rows: Vec<Vec<u64>>,
}

impl Revealed {
    /// The values of the named field, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<u64>> {
        let index = self.fields.iter().position(|f| f == name)?;
        Some(self.rows.iter().map(|row| row[index]).collect())
    }
}

impl fmt::Display for Revealed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(u64::to_string).collect())
            .collect();
        let widths: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .map(|row| row[i].len())
                    .fold(name.len(), usize::max)
            })
            .collect();
        let header: Vec<String> = self
            .fields
            .iter()
            .zip(&widths)
            .map(|(name, w)| format!("{name:>w$}"))
            .collect();
        writeln!(f, "{}", header.join(" | "))?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;
        for row in &cells {
            let row: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, w)| format!("{cell:>w$}"))
                .collect();
            writeln!(f, "{}", row.join(" | "))?;
        }
        write!(f, "({} rows)", self.rows.len())
    }
}

/// Combines both parties' shares of a view into its valid rows.
///
/// Fails with [`Error::SchemaMismatch`] if the views do not have the same fields and rows.
pub fn reconstruct(a: &View, b: &View) -> Result<Revealed, Error> {
    if a.fields() != b.fields() || a.row_num() != b.row_num() {
        return Err(Error::SchemaMismatch);
    }
    let data = a.data_fields();
    let mut rows = vec![];
    for r in 0..a.row_num() {
        if combine(a.valid()[r], b.valid()[r], 1) == 0 {
            continue;
        }
        let row = data
            .iter()
            .enumerate()
            .map(|(c, field)| combine(a.col(c)[r], b.col(c)[r], field.width))
            .collect();
        rows.push(row);
    }
    Ok(Revealed {
        fields: data.iter().map(|f| f.name.clone()).collect(),
        rows,
    })
}
