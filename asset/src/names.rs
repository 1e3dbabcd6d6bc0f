//! The interned ASCII string pool every name-bearing field indexes into.

use mk11_archive::{Cursor, Error, Result, TableMeta};

/// The image's name table.
#[derive(Clone, Debug, Default)]
pub struct NameTable {
    names: Vec<String>,
}

impl NameTable {
    /// Builds a table from pre-decoded names. Useful for driving the
    /// property decoder outside a full asset parse.
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Reads the table at its summary-declared offset.
    pub(crate) fn read(c: &mut Cursor<'_>, meta: &TableMeta) -> Result<Self> {
        c.seek(meta.offset.get());
        let count = meta.entries.get();
        let mut names = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let len = c.u32()?;
            names.push(c.ascii(len as usize)?);
        }
        Ok(Self { names })
    }

    /// Looks up a name by index.
    pub fn get(&self, index: u64) -> Result<&str> {
        self.names
            .get(usize::try_from(index).unwrap_or(usize::MAX))
            .map(String::as_str)
            .ok_or(Error::BadNameIndex {
                index,
                len: self.names.len(),
            })
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates the names in table order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
