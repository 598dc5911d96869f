//! Row/column tabular data with labelled info rows.
//!
//! A `Table` is an ordered sequence of rows and an ordered sequence of
//! columns. Cells are textual; an absent cell is distinct from an empty
//! one. Besides body rows, a table carries *info rows*: full-width rows
//! keyed by a label (`info`, `type`, `sense`, `max`, free-form). The row
//! labelled `type` acts as the ruler, holding per-column type hints that
//! readers may reinterpret.
//!
//! Rows are keyed by an id that is unique for the lifetime of the table
//! and grows in insertion order, so id order is insertion order. A
//! per-table row cursor supports cooperative traversal; deleting the
//! current row advances the cursor to its successor.

use crate::error::TableError;
use crate::ordmap::OrdMap;

/// A single table cell. `None` is the absent cell.
pub type Cell = Option<String>;

/// Label of the info row that acts as the ruler (per-column type hints).
pub const RULER_LABEL: &str = "type";

#[derive(Debug, Clone)]
struct Column {
    name: String,
    default: Cell,
}

#[derive(Debug, Clone)]
struct InfoRow {
    label: String,
    cells: Vec<Cell>,
}

/// Tabular data: ordered columns, id-keyed rows, labelled info rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    cols: Vec<Column>,
    rows: OrdMap<u64, Vec<Cell>>,
    next_row: u64,
    info: Vec<InfoRow>,
}

impl Table {
    /// Creates an empty table with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with the given column order and no rows.
    pub fn with_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut t = Self::new();
        for name in names {
            // duplicate names collapse silently here; explicit adds report
            let _ = t.add_column(&name.into(), None);
        }
        t
    }

    /// Copies the donor's schema (columns, defaults, info rows) without rows.
    pub fn from_schema(donor: &Table) -> Self {
        Self {
            cols: donor.cols.clone(),
            rows: OrdMap::new(),
            next_row: 0,
            info: donor.info.clone(),
        }
    }

    // ---------------------------------------------------------------------
    // COLUMNS
    // ---------------------------------------------------------------------

    /// Appends a column. Existing rows and info rows get `default` / absent.
    pub fn add_column(&mut self, name: &str, default: Cell) -> Result<(), TableError> {
        if self.has_column(name) {
            return Err(TableError::DuplicateColumn(name.to_string()));
        }
        self.cols.push(Column {
            name: name.to_string(),
            default: default.clone(),
        });
        let ids: Vec<u64> = self.rows.keys().copied().collect();
        for id in ids {
            if let Some(row) = self.rows.get_mut(&id) {
                row.push(default.clone());
            }
        }
        for inf in &mut self.info {
            inf.cells.push(None);
        }
        Ok(())
    }

    /// Removes a column and its cell in every row and info row.
    pub fn remove_column(&mut self, name: &str) -> Result<(), TableError> {
        let idx = self
            .col_index(name)
            .ok_or_else(|| TableError::NoSuchColumn(name.to_string()))?;
        self.cols.remove(idx);
        let ids: Vec<u64> = self.rows.keys().copied().collect();
        for id in ids {
            if let Some(row) = self.rows.get_mut(&id) {
                row.remove(idx);
            }
        }
        for inf in &mut self.info {
            inf.cells.remove(idx);
        }
        Ok(())
    }

    /// Returns true if a column with this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.col_index(name).is_some()
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> Vec<&str> {
        self.cols.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of columns.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.cols.len()
    }

    /// Number of body rows.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no body rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn col_index(&self, name: &str) -> Option<usize> {
        self.cols.iter().position(|c| c.name == name)
    }

    // ---------------------------------------------------------------------
    // ROWS
    // ---------------------------------------------------------------------

    /// Adds a row from (column, value) pairs, cloning the values.
    ///
    /// Unknown column names are ignored; columns not named take their
    /// default. Returns the new row id.
    pub fn add_row<'a, I>(&mut self, cells: I) -> u64
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let owned: Vec<(String, Cell)> = cells
            .into_iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect();
        self.add_row_cells(owned)
    }

    /// Adds a row from owned (column, cell) pairs: the donation form.
    ///
    /// The caller transfers ownership of the cells; nothing is cloned.
    pub fn add_row_cells(&mut self, cells: Vec<(String, Cell)>) -> u64 {
        let mut row: Vec<Cell> = self.cols.iter().map(|c| c.default.clone()).collect();
        for (name, cell) in cells {
            if let Some(idx) = self.col_index(&name) {
                row[idx] = cell;
            }
        }
        self.push_row(row)
    }

    /// Adds a row of column defaults and leaves the cursor on it.
    pub fn add_empty_row(&mut self) -> u64 {
        let row: Vec<Cell> = self.cols.iter().map(|c| c.default.clone()).collect();
        let id = self.push_row(row);
        self.rows.cursor_goto(&id);
        id
    }

    fn push_row(&mut self, row: Vec<Cell>) -> u64 {
        let id = self.next_row;
        self.next_row += 1;
        self.rows.insert(id, row);
        id
    }

    /// Cell of `row` under `col`; `None` covers missing row, missing
    /// column and absent cell alike.
    pub fn cell(&self, row: u64, col: &str) -> Option<&str> {
        let idx = self.col_index(col)?;
        self.rows.get(&row)?.get(idx)?.as_deref()
    }

    /// Replaces a cell addressed by row id and column name.
    pub fn replace_cell(&mut self, row: u64, col: &str, cell: Cell) -> Result<(), TableError> {
        let idx = self
            .col_index(col)
            .ok_or_else(|| TableError::NoSuchColumn(col.to_string()))?;
        let r = self
            .rows
            .get_mut(&row)
            .ok_or(TableError::NoSuchRow(row))?;
        r[idx] = cell;
        Ok(())
    }

    /// The row as (column, cell) pairs in column order.
    pub fn row(&self, id: u64) -> Option<Vec<(&str, Option<&str>)>> {
        let row = self.rows.get(&id)?;
        Some(
            self.cols
                .iter()
                .zip(row.iter())
                .map(|(c, cell)| (c.name.as_str(), cell.as_deref()))
                .collect(),
        )
    }

    /// The row as owned (column, cell) pairs, suitable for re-adding.
    pub fn row_owned(&self, id: u64) -> Option<Vec<(String, Cell)>> {
        let row = self.rows.get(&id)?;
        Some(
            self.cols
                .iter()
                .zip(row.iter())
                .map(|(c, cell)| (c.name.clone(), cell.clone()))
                .collect(),
        )
    }

    /// Row ids in insertion order.
    pub fn row_ids(&self) -> Vec<u64> {
        self.rows.keys().copied().collect()
    }

    // ---------------------------------------------------------------------
    // ROW CURSOR
    // ---------------------------------------------------------------------

    /// Positions the cursor on the first row.
    pub fn first(&mut self) -> Option<u64> {
        self.rows.cursor_first();
        self.current_row_id()
    }

    /// Positions the cursor on the last row.
    pub fn last(&mut self) -> Option<u64> {
        self.rows.cursor_last();
        self.current_row_id()
    }

    /// Advances the cursor; `None` once beyond the last row.
    pub fn next(&mut self) -> Option<u64> {
        self.rows.cursor_next();
        self.current_row_id()
    }

    /// Steps the cursor back.
    pub fn prev(&mut self) -> Option<u64> {
        self.rows.cursor_prev();
        self.current_row_id()
    }

    /// True when the cursor has run past the final row.
    #[inline]
    pub fn beyond_end(&self) -> bool {
        self.rows.cursor_beyond_end()
    }

    /// Positions the cursor on a specific row id.
    pub fn goto_row(&mut self, id: u64) -> bool {
        self.rows.cursor_goto(&id)
    }

    /// Row id under the cursor.
    pub fn current_row_id(&self) -> Option<u64> {
        self.rows.cursor_key().copied()
    }

    /// Cell of the current row under `col`.
    pub fn current_cell(&self, col: &str) -> Option<&str> {
        let idx = self.col_index(col)?;
        let (_, row) = self.rows.cursor_entry()?;
        row.get(idx)?.as_deref()
    }

    /// Replaces a cell of the current row.
    pub fn replace_current_cell(&mut self, col: &str, cell: Cell) -> Result<(), TableError> {
        let idx = self
            .col_index(col)
            .ok_or_else(|| TableError::NoSuchColumn(col.to_string()))?;
        let row = self.rows.cursor_value_mut().ok_or(TableError::NoCurrentRow)?;
        row[idx] = cell;
        Ok(())
    }

    /// Removes the current row; the cursor advances to its successor.
    pub fn remove_current_row(&mut self) -> Result<(), TableError> {
        self.rows
            .remove_at_cursor()
            .map(|_| ())
            .ok_or(TableError::NoCurrentRow)
    }

    // ---------------------------------------------------------------------
    // INFO ROWS
    // ---------------------------------------------------------------------

    /// Attaches (or replaces) an info row under `label` from (column,
    /// value) pairs. Unknown columns are ignored.
    pub fn add_info<'a, I>(&mut self, label: &str, cells: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut row: Vec<Cell> = vec![None; self.cols.len()];
        for (name, value) in cells {
            if let Some(idx) = self.col_index(name) {
                row[idx] = Some(value.to_string());
            }
        }
        self.set_info_cells(label, row);
    }

    /// Attaches (or replaces) an info row from cells already in column order.
    pub fn set_info_cells(&mut self, label: &str, mut cells: Vec<Cell>) {
        cells.resize(self.cols.len(), None);
        if let Some(inf) = self.info.iter_mut().find(|i| i.label == label) {
            inf.cells = cells;
        } else {
            self.info.push(InfoRow {
                label: label.to_string(),
                cells,
            });
        }
    }

    /// The info row under `label` as (column, cell) pairs.
    pub fn info(&self, label: &str) -> Option<Vec<(&str, Option<&str>)>> {
        let inf = self.info.iter().find(|i| i.label == label)?;
        Some(
            self.cols
                .iter()
                .zip(inf.cells.iter())
                .map(|(c, cell)| (c.name.as_str(), cell.as_deref()))
                .collect(),
        )
    }

    /// One cell of an info row.
    pub fn info_cell(&self, label: &str, col: &str) -> Option<&str> {
        let idx = self.col_index(col)?;
        let inf = self.info.iter().find(|i| i.label == label)?;
        inf.cells.get(idx)?.as_deref()
    }

    /// Info labels in attachment order.
    pub fn info_labels(&self) -> Vec<&str> {
        self.info.iter().map(|i| i.label.as_str()).collect()
    }

    /// Drops an info row.
    pub fn remove_info(&mut self, label: &str) {
        self.info.retain(|i| i.label != label);
    }

    /// The ruler row (`type` label), if attached.
    pub fn ruler(&self) -> Option<Vec<(&str, Option<&str>)>> {
        self.info(RULER_LABEL)
    }

    /// Appends a row of cells already in column order (scanner path).
    /// Short rows are padded with absent cells; long rows grow unnamed
    /// columns first via the caller.
    pub(crate) fn push_row_positional(&mut self, mut cells: Vec<Cell>) -> u64 {
        cells.resize(self.cols.len(), None);
        self.push_row(cells)
    }

    pub(crate) fn info_rows_raw(&self) -> impl Iterator<Item = (&str, &[Cell])> {
        self.info.iter().map(|i| (i.label.as_str(), i.cells.as_slice()))
    }

    pub(crate) fn row_cells_raw(&self, id: u64) -> Option<&[Cell]> {
        self.rows.get(&id).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::with_columns(["name", "value"]);
        t.add_row([("name", "alpha"), ("value", "1")]);
        t.add_row([("name", "beta"), ("value", "2")]);
        t
    }

    #[test]
    fn test_columns_in_insertion_order() {
        let t = sample();
        assert_eq!(t.column_names(), ["name", "value"]);
        assert_eq!(t.ncols(), 2);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut t = sample();
        assert!(matches!(
            t.add_column("name", None),
            Err(TableError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn test_add_column_backfills_default() {
        let mut t = sample();
        t.add_column("unit", Some("ms".to_string())).unwrap();
        assert_eq!(t.cell(0, "unit"), Some("ms"));
        assert_eq!(t.cell(1, "unit"), Some("ms"));
    }

    #[test]
    fn test_missing_cells_read_absent() {
        let mut t = Table::with_columns(["a", "b"]);
        let id = t.add_row([("a", "x")]);
        assert_eq!(t.cell(id, "a"), Some("x"));
        assert_eq!(t.cell(id, "b"), None);
        assert_eq!(t.cell(id, "zzz"), None);
    }

    #[test]
    fn test_cursor_walk_and_remove() {
        let mut t = sample();
        t.add_row([("name", "gamma"), ("value", "3")]);

        t.first();
        t.next(); // beta
        assert_eq!(t.current_cell("name"), Some("beta"));
        t.remove_current_row().unwrap();
        // cursor advanced to the successor
        assert_eq!(t.current_cell("name"), Some("gamma"));
        assert_eq!(t.nrows(), 2);
    }

    #[test]
    fn test_row_ids_survive_removal() {
        let mut t = sample();
        t.first();
        t.remove_current_row().unwrap();
        let id = t.add_row([("name", "gamma"), ("value", "3")]);
        assert_eq!(id, 2); // ids are never reused
        assert_eq!(t.row_ids(), vec![1, 2]);
    }

    #[test]
    fn test_info_rows_and_ruler() {
        let mut t = sample();
        t.add_info("info", [("name", "the name"), ("value", "a number")]);
        t.add_info(RULER_LABEL, [("name", "str"), ("value", "i32")]);

        assert_eq!(t.info_labels(), ["info", "type"]);
        assert_eq!(t.info_cell("type", "value"), Some("i32"));
        let ruler = t.ruler().unwrap();
        assert_eq!(ruler[0], ("name", Some("str")));
    }

    #[test]
    fn test_remove_column_prunes_rows_and_info() {
        let mut t = sample();
        t.add_info(RULER_LABEL, [("name", "str"), ("value", "i32")]);
        t.remove_column("name").unwrap();
        assert_eq!(t.column_names(), ["value"]);
        assert_eq!(t.cell(0, "value"), Some("1"));
        assert_eq!(t.info_cell(RULER_LABEL, "value"), Some("i32"));
    }

    #[test]
    fn test_from_schema_copies_no_rows() {
        let mut donor = sample();
        donor.add_info(RULER_LABEL, [("name", "str")]);
        let t = Table::from_schema(&donor);
        assert_eq!(t.column_names(), donor.column_names());
        assert_eq!(t.info_labels(), donor.info_labels());
        assert_eq!(t.nrows(), 0);
    }

    #[test]
    fn test_donated_row_cells() {
        let mut t = Table::with_columns(["a"]);
        let id = t.add_row_cells(vec![("a".to_string(), Some("owned".to_string()))]);
        assert_eq!(t.cell(id, "a"), Some("owned"));
    }
}
