//! Printing tables back to text.
//!
//! Two renditions: the canonical form (`out_table`/`out_body`) that
//! scanning reproduces cell-for-cell, and a justified form (`print`) for
//! human eyes. Cells containing a separator, whitespace or a quote are
//! quoted, with `"` carried as `\x01` and newline as `\x02` inside the
//! quotes, which is the encoding the scanner reverses.

use crate::table::{Cell, Table};

/// Renders one cell for the canonical form.
///
/// The absent cell prints as `-`; the empty cell as `""`; a literal `-`
/// is force-quoted so it reads back as a value rather than as absent.
pub fn quote_cell(cell: Option<&str>, seps: &str) -> String {
    let Some(s) = cell else {
        return "-".to_string();
    };
    if s.is_empty() {
        return "\"\"".to_string();
    }
    let needs_quotes = s == "-"
        || s.chars().any(|c| {
            seps.contains(c) || c.is_whitespace() || c == '"'
        });
    if !needs_quotes {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push('\u{1}'),
            '\n' => out.push('\u{2}'),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Returns a string that always scans back as a single token.
///
/// Empty strings come back as `-`; strings with whitespace or quotes are
/// quoted with the bounded escape ladder applied forward: `"` becomes
/// `'`, `'` becomes `\x01`, `\x01` becomes `\x02`.
pub fn escape_token(s: &str) -> String {
    if s.is_empty() {
        return "-".to_string();
    }
    if !s.chars().any(|c| c.is_whitespace() || c == '"') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push('\''),
            '\'' => out.push('\u{1}'),
            '\u{1}' => out.push('\u{2}'),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

impl Table {
    /// Canonical rendition: optional header line, then (optionally) each
    /// info row followed by its label and a `--` ruler line, then body
    /// rows. Lines are LF-terminated.
    pub fn out_table(&self, sep: char, with_names: bool, with_ruler: bool) -> String {
        let seps = sep.to_string();
        let mut out = String::new();

        if with_names {
            let header: Vec<String> = self
                .column_names()
                .iter()
                .map(|n| quote_cell(Some(n), &seps))
                .collect();
            out.push_str(&header.join(&seps));
            out.push('\n');
        }

        if with_ruler {
            for (label, cells) in self.info_rows_raw() {
                for cell in cells {
                    out.push_str(&quote_cell(cell.as_deref(), &seps));
                    out.push(sep);
                }
                out.push_str(&quote_cell(Some(label), &seps));
                out.push('\n');
            }
            out.push_str("--\n");
        }

        out.push_str(&self.out_body_with(sep));
        out
    }

    /// Body rows only, tab-free canonical cells joined by `sep`.
    pub fn out_body(&self, sep: char) -> String {
        self.out_body_with(sep)
    }

    fn out_body_with(&self, sep: char) -> String {
        let seps = sep.to_string();
        let mut out = String::new();
        for id in self.row_ids() {
            let Some(cells) = self.row_cells_raw(id) else {
                continue;
            };
            let line: Vec<String> = cells
                .iter()
                .map(|c| quote_cell(c.as_deref(), &seps))
                .collect();
            out.push_str(&line.join(&seps));
            out.push('\n');
        }
        out
    }

    /// One row rendered in canonical form, for diagnostics.
    pub fn out_row(&self, id: u64, sep: char) -> Option<String> {
        let seps = sep.to_string();
        let cells = self.row_cells_raw(id)?;
        let line: Vec<String> = cells
            .iter()
            .map(|c| quote_cell(c.as_deref(), &seps))
            .collect();
        Some(line.join(&seps))
    }

    /// Justified, human-readable rendition with header, info rows and a
    /// `--` rule. Not intended to be scanned back.
    pub fn print(&self) -> String {
        let names = self.column_names();
        let ncols = names.len();
        let mut widths: Vec<usize> = names.iter().map(|n| n.chars().count()).collect();

        let measure = |widths: &mut Vec<usize>, cells: &[Cell]| {
            for (i, c) in cells.iter().enumerate().take(ncols) {
                let w = c.as_deref().unwrap_or("-").chars().count();
                if w > widths[i] {
                    widths[i] = w;
                }
            }
        };
        for (_, cells) in self.info_rows_raw() {
            measure(&mut widths, cells);
        }
        for id in self.row_ids() {
            if let Some(cells) = self.row_cells_raw(id) {
                measure(&mut widths, cells);
            }
        }

        let mut out = String::new();
        let pad_line = |out: &mut String, fields: &[&str], widths: &[usize]| {
            for (i, f) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(f);
                if i + 1 < fields.len() {
                    for _ in f.chars().count()..widths[i] {
                        out.push(' ');
                    }
                }
            }
            out.push('\n');
        };

        pad_line(&mut out, &names, &widths);
        for (label, cells) in self.info_rows_raw() {
            let mut fields: Vec<&str> =
                cells.iter().map(|c| c.as_deref().unwrap_or("-")).collect();
            fields.truncate(ncols);
            fields.push(label);
            pad_line(&mut out, &fields, &widths);
        }
        out.push_str("--\n");
        for id in self.row_ids() {
            if let Some(cells) = self.row_cells_raw(id) {
                let fields: Vec<&str> =
                    cells.iter().map(|c| c.as_deref().unwrap_or("-")).collect();
                pad_line(&mut out, &fields, &widths);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::ScanOptions;
    use crate::table::RULER_LABEL;

    fn sample() -> Table {
        let mut t = Table::with_columns(["name", "count"]);
        t.add_info("info", [("name", "the name"), ("count", "how many")]);
        t.add_info(RULER_LABEL, [("name", "str"), ("count", "i32")]);
        t.add_row([("name", "alpha"), ("count", "1")]);
        t.add_row([("name", "two words"), ("count", "2")]);
        t
    }

    #[test]
    fn test_quote_cell_rules() {
        assert_eq!(quote_cell(None, "\t"), "-");
        assert_eq!(quote_cell(Some(""), "\t"), "\"\"");
        assert_eq!(quote_cell(Some("-"), "\t"), "\"-\"");
        assert_eq!(quote_cell(Some("plain"), "\t"), "plain");
        assert_eq!(quote_cell(Some("a b"), "\t"), "\"a b\"");
        assert_eq!(quote_cell(Some("say \"hi\""), "\t"), "\"say \u{1}hi\u{1}\"");
        assert_eq!(quote_cell(Some("a\nb"), "\t"), "\"a\u{2}b\"");
    }

    #[test]
    fn test_escape_token_ladder() {
        assert_eq!(escape_token(""), "-");
        assert_eq!(escape_token("plain"), "plain");
        assert_eq!(escape_token("a \"b\""), "\"a 'b'\"");
        assert_eq!(escape_token("it's"), "\"it\u{1}s\"");
    }

    #[test]
    fn test_out_body_shape() {
        let t = sample();
        let body = t.out_body('\t');
        assert_eq!(body, "alpha\t1\n\"two words\"\t2\n");
    }

    #[test]
    fn test_out_table_canonical_shape() {
        let t = sample();
        let text = t.out_table('\t', true, true);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "name\tcount");
        assert_eq!(lines[1], "\"the name\"\t\"how many\"\tinfo");
        assert_eq!(lines[2], "str\ti32\ttype");
        assert_eq!(lines[3], "--");
        assert_eq!(lines[4], "alpha\t1");
    }

    #[test]
    fn test_round_trip_preserves_cells_and_order() {
        let t = sample();
        let text = t.out_table('\t', true, true);

        let mut back = Table::new();
        let opts = ScanOptions {
            seps: "\t".to_string(),
            multisep: false,
            has_names: true,
            has_info: true,
        };
        back.scan(&text, &opts).unwrap();

        assert_eq!(back.column_names(), t.column_names());
        assert_eq!(back.info_labels(), t.info_labels());
        assert_eq!(back.nrows(), t.nrows());
        for (a, b) in t.row_ids().into_iter().zip(back.row_ids()) {
            assert_eq!(t.row(a), back.row(b));
        }
        // a second cycle is byte-identical
        assert_eq!(back.out_table('\t', true, true), text);
    }

    #[test]
    fn test_round_trip_absent_and_empty() {
        let mut t = Table::with_columns(["a", "b", "c"]);
        t.add_row_cells(vec![
            ("a".to_string(), None),
            ("b".to_string(), Some(String::new())),
            ("c".to_string(), Some("-".to_string())),
        ]);
        let text = t.out_table(',', true, false);

        let mut back = Table::new();
        let opts = ScanOptions {
            seps: ",".to_string(),
            multisep: false,
            has_names: true,
            has_info: false,
        };
        back.scan(&text, &opts).unwrap();
        assert_eq!(back.cell(0, "a"), None);
        assert_eq!(back.cell(0, "b"), Some(""));
        assert_eq!(back.cell(0, "c"), Some("-"));
    }

    #[test]
    fn test_print_justified() {
        let t = sample();
        let text = t.print();
        assert!(text.contains("--\n"));
        assert!(text.lines().next().unwrap().starts_with("name"));
    }
}
