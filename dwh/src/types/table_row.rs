use crate::types::cell::Cell;
use crate::types::schema::TableSchema;

static NULL: Cell = Cell::Null;

/// Values of one row, ordered like the columns of its [`TableSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    values: Vec<Cell>,
}

impl TableRow {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Returns the value at `index`, or [`Cell::Null`] past the end of a short row.
    pub fn get(&self, index: usize) -> &Cell {
        self.values.get(index).unwrap_or(&NULL)
    }

    /// Replaces the value at `index`, padding a short row with nulls.
    pub fn set(&mut self, index: usize, cell: Cell) {
        if index >= self.values.len() {
            self.values.resize(index + 1, Cell::Null);
        }
        self.values[index] = cell;
    }
}

/// A batch of rows sharing one schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableRows {
    pub schema: TableSchema,
    pub rows: Vec<TableRow>,
}

impl TableRows {
    pub fn new(schema: TableSchema, rows: Vec<TableRow>) -> Self {
        Self { schema, rows }
    }

    pub fn empty(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableRow> {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_rows_read_and_grow_with_nulls() {
        let mut row = TableRow::new(vec![Cell::from("AAPL")]);
        assert_eq!(row.get(3), &Cell::Null);

        row.set(2, Cell::I64(1));
        assert_eq!(
            row.values(),
            &[Cell::from("AAPL"), Cell::Null, Cell::I64(1)]
        );
    }
}
