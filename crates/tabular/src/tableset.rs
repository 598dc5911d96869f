//! Stateful selection views over a table.
//!
//! A `TableSet` leaves the underlying table untouched and accumulates a
//! column projection, AND-ed `where`/`unless` row filters and an optional
//! sort, loosely following the verbs of a query statement. The final data
//! is materialized into a fresh table or rendered to text.

use crate::error::TableError;
use crate::scan::scan_fields;
use crate::table::Table;

/// Comparison operators for `where`/`unless` clauses.
///
/// `Eq`, `Ne` and `Begins` compare as strings; the ordering operators
/// compare numerically, promoting to floating point when either operand
/// contains a `.`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Begins,
}

impl SelectOp {
    /// Parses the operator word used in selection text blocks.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "ge" => Some(Self::Ge),
            "le" => Some(Self::Le),
            "begins" => Some(Self::Begins),
            _ => None,
        }
    }
}

/// Sort direction and collation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    AsciiAsc,
    AsciiDesc,
    NumericAsc,
    NumericDesc,
}

#[derive(Debug, Clone)]
struct Clause {
    col: String,
    op: SelectOp,
    value: String,
    /// true for `where` (keep on match), false for `unless` (drop on match)
    is_where: bool,
}

/// A configurable selection over a borrowed table.
pub struct TableSet<'t> {
    tab: &'t Table,
    cols: Option<Vec<String>>,
    clauses: Vec<Clause>,
    sort: Option<(String, SortOrder)>,
}

impl<'t> TableSet<'t> {
    /// Creates a view over `tab` with no filtering: all columns, all rows.
    pub fn new(tab: &'t Table) -> Self {
        Self {
            tab,
            cols: None,
            clauses: Vec::new(),
            sort: None,
        }
    }

    /// Projects onto the named columns, in the given order. Names the
    /// table does not carry are dropped from the projection.
    pub fn select<I, S>(&mut self, cols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cols = Some(
            cols.into_iter()
                .map(Into::into)
                .filter(|c| self.tab.has_column(c))
                .collect(),
        );
        self
    }

    /// Text form of [`select`](Self::select): whitespace-separated names.
    pub fn select_text(&mut self, cols: &str) -> &mut Self {
        self.select(cols.split_whitespace().map(str::to_string))
    }

    /// Projects onto every column except the named ones.
    pub fn exclude<I, S>(&mut self, nocols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let drop: Vec<String> = nocols.into_iter().map(Into::into).collect();
        self.cols = Some(
            self.tab
                .column_names()
                .iter()
                .filter(|c| !drop.iter().any(|d| d == *c))
                .map(|c| (*c).to_string())
                .collect(),
        );
        self
    }

    /// Text form of [`exclude`](Self::exclude).
    pub fn exclude_text(&mut self, nocols: &str) -> &mut Self {
        self.exclude(nocols.split_whitespace().map(str::to_string))
    }

    /// Keeps rows matching the condition. Clauses AND together.
    pub fn where_clause(&mut self, col: &str, op: SelectOp, value: &str) -> &mut Self {
        self.clauses.push(Clause {
            col: col.to_string(),
            op,
            value: value.to_string(),
            is_where: true,
        });
        self
    }

    /// Drops rows matching the condition. Clauses AND together.
    pub fn unless(&mut self, col: &str, op: SelectOp, value: &str) -> &mut Self {
        self.clauses.push(Clause {
            col: col.to_string(),
            op,
            value: value.to_string(),
            is_where: false,
        });
        self
    }

    /// Orders the output rows by a column.
    pub fn sort_by(&mut self, col: &str, order: SortOrder) -> &mut Self {
        self.sort = Some((col.to_string(), order));
        self
    }

    /// Configures filters from a text block of lines:
    ///
    /// ```text
    /// where  <col> <op> <val>
    /// unless <col> <op> <val>
    /// ```
    pub fn configure(&mut self, commands: &str) -> Result<&mut Self, TableError> {
        let lines =
            scan_fields(commands, " \t", true).map_err(TableError::from)?;
        for (ln, fields) in lines.iter().enumerate() {
            if fields.len() != 4 {
                return Err(TableError::BadSelection(format!(
                    "line {} needs 4 words (mode col op val)",
                    ln + 1
                )));
            }
            let op = SelectOp::parse(&fields[2]).ok_or_else(|| {
                TableError::BadSelection(format!(
                    "line {} has unknown operator '{}'",
                    ln + 1,
                    fields[2]
                ))
            })?;
            match fields[0].as_str() {
                "where" => self.where_clause(&fields[1], op, &fields[3]),
                "unless" => self.unless(&fields[1], op, &fields[3]),
                other => {
                    return Err(TableError::BadSelection(format!(
                        "line {} has unknown verb '{}'",
                        ln + 1,
                        other
                    )))
                }
            };
        }
        Ok(self)
    }

    /// Row ids passing every clause, in output order.
    fn selected_rows(&self) -> Vec<u64> {
        let mut rows: Vec<u64> = self
            .tab
            .row_ids()
            .into_iter()
            .filter(|id| self.row_passes(*id))
            .collect();

        if let Some((col, order)) = &self.sort {
            match order {
                SortOrder::AsciiAsc | SortOrder::AsciiDesc => {
                    rows.sort_by(|a, b| {
                        let va = self.tab.cell(*a, col).unwrap_or("");
                        let vb = self.tab.cell(*b, col).unwrap_or("");
                        va.cmp(vb)
                    });
                }
                SortOrder::NumericAsc | SortOrder::NumericDesc => {
                    rows.sort_by(|a, b| {
                        let va = numeric(self.tab.cell(*a, col).unwrap_or(""));
                        let vb = numeric(self.tab.cell(*b, col).unwrap_or(""));
                        va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
                    });
                }
            }
            if matches!(order, SortOrder::AsciiDesc | SortOrder::NumericDesc) {
                rows.reverse();
            }
        }
        rows
    }

    fn row_passes(&self, id: u64) -> bool {
        for clause in &self.clauses {
            // a missing cell behaves like NULL: the clause is skipped
            let Some(value) = self.tab.cell(id, &clause.col) else {
                continue;
            };
            let matched = eval(clause.op, value, &clause.value);
            if clause.is_where && !matched {
                return false;
            }
            if !clause.is_where && matched {
                return false;
            }
        }
        true
    }

    /// Materializes the selection into a new table.
    pub fn into_table(&self) -> Table {
        let mut target = match &self.cols {
            Some(cols) => {
                let mut t = Table::with_columns(cols.iter().map(String::as_str));
                // carry the info rows across the projection
                for label in self.tab.info_labels() {
                    if let Some(cells) = self.tab.info(label) {
                        let pairs: Vec<(&str, &str)> = cells
                            .into_iter()
                            .filter_map(|(c, v)| v.map(|v| (c, v)))
                            .collect();
                        t.add_info(label, pairs);
                    }
                }
                t
            }
            None => Table::from_schema(self.tab),
        };

        for id in self.selected_rows() {
            if let Some(row) = self.tab.row_owned(id) {
                let keep: Vec<_> = row
                    .into_iter()
                    .filter(|(name, _)| target.has_column(name))
                    .collect();
                target.add_row_cells(keep);
            }
        }
        target
    }

    /// Renders the selection with the table's canonical form.
    pub fn render(&self, sep: char, with_names: bool, with_ruler: bool) -> String {
        self.into_table().out_table(sep, with_names, with_ruler)
    }
}

/// Numeric interpretation used by ordering operators and numeric sorts.
fn numeric(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(0.0)
}

fn eval(op: SelectOp, value: &str, against: &str) -> bool {
    match op {
        SelectOp::Eq => value == against,
        SelectOp::Ne => value != against,
        SelectOp::Begins => value.starts_with(against),
        SelectOp::Gt | SelectOp::Lt | SelectOp::Ge | SelectOp::Le => {
            // auto-promote to floating point when either side carries a '.'
            if value.contains('.') || against.contains('.') {
                let a = numeric(value);
                let b = numeric(against);
                match op {
                    SelectOp::Gt => a > b,
                    SelectOp::Lt => a < b,
                    SelectOp::Ge => a >= b,
                    SelectOp::Le => a <= b,
                    _ => unreachable!(),
                }
            } else {
                let a = value.trim().parse::<i64>().unwrap_or(0);
                let b = against.trim().parse::<i64>().unwrap_or(0);
                match op {
                    SelectOp::Gt => a > b,
                    SelectOp::Lt => a < b,
                    SelectOp::Ge => a >= b,
                    SelectOp::Le => a <= b,
                    _ => unreachable!(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut t = Table::with_columns(["host", "load", "disk"]);
        t.add_row([("host", "ash"), ("load", "0.5"), ("disk", "10")]);
        t.add_row([("host", "beech"), ("load", "2.5"), ("disk", "70")]);
        t.add_row([("host", "birch"), ("load", "1.0"), ("disk", "40")]);
        t
    }

    #[test]
    fn test_select_projection_order() {
        let t = sample();
        let mut set = TableSet::new(&t);
        set.select_text("disk host nosuch");
        let out = set.into_table();
        assert_eq!(out.column_names(), ["disk", "host"]);
        assert_eq!(out.nrows(), 3);
    }

    #[test]
    fn test_exclude() {
        let t = sample();
        let mut set = TableSet::new(&t);
        set.exclude_text("load");
        assert_eq!(set.into_table().column_names(), ["host", "disk"]);
    }

    #[test]
    fn test_where_numeric_promotion() {
        let t = sample();
        let mut set = TableSet::new(&t);
        set.where_clause("load", SelectOp::Gt, "0.9");
        let out = set.into_table();
        assert_eq!(out.nrows(), 2);
    }

    #[test]
    fn test_where_integer_context() {
        let t = sample();
        let mut set = TableSet::new(&t);
        set.where_clause("disk", SelectOp::Ge, "40");
        assert_eq!(set.into_table().nrows(), 2);
    }

    #[test]
    fn test_unless_drops_matches() {
        let t = sample();
        let mut set = TableSet::new(&t);
        set.unless("host", SelectOp::Begins, "b");
        let out = set.into_table();
        assert_eq!(out.nrows(), 1);
        assert_eq!(out.cell(0, "host"), Some("ash"));
    }

    #[test]
    fn test_clauses_and_together() {
        let t = sample();
        let mut set = TableSet::new(&t);
        set.where_clause("disk", SelectOp::Gt, "5")
            .unless("host", SelectOp::Eq, "beech");
        assert_eq!(set.into_table().nrows(), 2);
    }

    #[test]
    fn test_configure_from_text() {
        let t = sample();
        let mut set = TableSet::new(&t);
        set.configure("where disk gt 5\nunless host eq beech\n").unwrap();
        assert_eq!(set.into_table().nrows(), 2);
    }

    #[test]
    fn test_configure_rejects_bad_operator() {
        let t = sample();
        let mut set = TableSet::new(&t);
        assert!(matches!(
            set.configure("where disk above 5\n"),
            Err(TableError::BadSelection(_))
        ));
    }

    #[test]
    fn test_sort_numeric_desc() {
        let t = sample();
        let mut set = TableSet::new(&t);
        set.sort_by("disk", SortOrder::NumericDesc);
        let out = set.into_table();
        assert_eq!(out.cell(0, "host"), Some("beech"));
        assert_eq!(out.cell(2, "host"), Some("ash"));
    }

    #[test]
    fn test_sort_ascii_asc() {
        let t = sample();
        let mut set = TableSet::new(&t);
        set.sort_by("host", SortOrder::AsciiAsc);
        let out = set.into_table();
        assert_eq!(out.cell(0, "host"), Some("ash"));
    }
}
