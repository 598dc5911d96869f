//! Text scanning: buffers of separated lines into tables.
//!
//! The scanner understands one or more separator characters, a
//! multi-separator mode (a run of separators delimits one field), quoted
//! runs that may span newlines, and the reversal of the on-the-wire
//! escapes produced by printing: inside quotes, `\x01` reads back as `"`
//! and `\x02` as newline. Config-style scans additionally treat a `#`
//! token as a comment reaching the end of its line.

use crate::error::{ScanError, TableError};
use crate::table::{Cell, Table};

/// How a scan should interpret its input buffer.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Column separator characters (any of them separates).
    pub seps: String,
    /// Treat a run of separators as a single delimiter.
    pub multisep: bool,
    /// The first non-empty line carries the column names.
    pub has_names: bool,
    /// Info rows follow the header, terminated by a `--` line.
    pub has_info: bool,
}

impl ScanOptions {
    /// Plain body-only scan with the given separators.
    pub fn new(seps: &str) -> Self {
        Self {
            seps: seps.to_string(),
            multisep: false,
            has_names: false,
            has_info: false,
        }
    }
}

/// One scanned field plus whether it was quoted in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub text: String,
    pub quoted: bool,
}

impl Token {
    fn empty() -> Self {
        Token {
            text: String::new(),
            quoted: false,
        }
    }

    /// The cell this token denotes: an unquoted `-` is the absent cell.
    pub fn into_cell(self) -> Cell {
        if !self.quoted && self.text == "-" {
            None
        } else {
            Some(self.text)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentMode {
    Plain,
    Hash,
}

/// Splits `text` into lines of fields. Blank lines produce no entry.
fn tokenize(
    text: &str,
    seps: &str,
    multisep: bool,
    comments: CommentMode,
) -> Result<Vec<Vec<Token>>, ScanError> {
    let bytes = text.as_bytes();
    let is_sep = |b: u8| seps.as_bytes().contains(&b);

    let mut lines: Vec<Vec<Token>> = Vec::new();
    let mut fields: Vec<Token> = Vec::new();
    let mut pending_sep = false;
    let mut line_no = 1usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i];

        // end of line
        if c == b'\n' {
            // a separator directly before EOL registers an empty cell
            if !multisep && pending_sep {
                fields.push(Token::empty());
            }
            if !fields.is_empty() {
                lines.push(std::mem::take(&mut fields));
            }
            pending_sep = false;
            line_no += 1;
            i += 1;
            continue;
        }

        // comment to end of line
        if comments == CommentMode::Hash && c == b'#' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            pending_sep = false;
            continue;
        }

        // quoted run, consuming everything up to the closing quote,
        // newlines included
        if c == b'"' {
            let start = i + 1;
            let end = match bytes[start..].iter().position(|&b| b == b'"') {
                Some(off) => start + off,
                None => return Err(ScanError::UnterminatedQuote(line_no)),
            };
            let raw = &text[start..end];
            line_no += raw.bytes().filter(|&b| b == b'\n').count();
            let unescaped: String = raw
                .chars()
                .map(|ch| match ch {
                    '\u{1}' => '"',
                    '\u{2}' => '\n',
                    other => other,
                })
                .collect();
            fields.push(Token {
                text: unescaped,
                quoted: true,
            });
            pending_sep = false;
            i = end + 1;
            continue;
        }

        // separator run
        if is_sep(c) {
            let mut run = 0usize;
            while i + run < bytes.len() && is_sep(bytes[i + run]) {
                run += 1;
            }
            if !multisep {
                // in single-separator mode each extra separator is an
                // empty cell; the first one only terminates a leading value
                let skip = usize::from(!fields.is_empty());
                for _ in skip..run {
                    fields.push(Token::empty());
                }
            }
            pending_sep = true;
            i += run;
            continue;
        }

        // unquoted token: up to separator or end of line
        let mut end = i;
        while end < bytes.len() && bytes[end] != b'\n' && !is_sep(bytes[end]) {
            end += 1;
        }
        fields.push(Token {
            text: text[i..end].to_string(),
            quoted: false,
        });
        pending_sep = false;
        i = end;
    }

    if !fields.is_empty() {
        lines.push(fields);
    }
    Ok(lines)
}

/// Scans `text` into lines of plain string fields.
pub fn scan_fields(text: &str, seps: &str, multisep: bool) -> Result<Vec<Vec<String>>, ScanError> {
    Ok(tokenize(text, seps, multisep, CommentMode::Plain)?
        .into_iter()
        .map(|line| line.into_iter().map(|t| t.text).collect())
        .collect())
}

/// Config-style scan: as [`scan_fields`] but `#` comments run to end of line.
pub fn scan_config_fields(
    text: &str,
    seps: &str,
    multisep: bool,
) -> Result<Vec<Vec<String>>, ScanError> {
    Ok(tokenize(text, seps, multisep, CommentMode::Hash)?
        .into_iter()
        .map(|line| line.into_iter().map(|t| t.text).collect())
        .collect())
}

impl Table {
    /// Scans a text buffer into this table, returning the number of body
    /// rows added.
    ///
    /// With `has_names`, the first non-empty line supplies the column
    /// names; missing columns are created in source order. With
    /// `has_info`, the following lines (each a full-width row with its
    /// label as the trailing field) attach as info rows until a literal
    /// `--` line. Headerless scans synthesize `column_0`, `column_1`, …
    /// names on demand.
    pub fn scan(&mut self, text: &str, opts: &ScanOptions) -> Result<usize, TableError> {
        let lines = tokenize(text, &opts.seps, opts.multisep, CommentMode::Plain)
            .map_err(TableError::from)?;
        let mut iter = lines.into_iter();

        if opts.has_names {
            let header = iter.next().ok_or(ScanError::MissingHeader)?;
            for tok in header {
                if !self.has_column(&tok.text) {
                    self.add_column(&tok.text, None)?;
                }
            }
        }

        if opts.has_info {
            let mut terminated = false;
            for mut line in iter.by_ref() {
                if line.len() == 1 && !line[0].quoted && line[0].text == "--" {
                    terminated = true;
                    break;
                }
                // the label travels as the trailing field
                let label = match line.pop() {
                    Some(tok) => tok.text,
                    None => continue,
                };
                let cells: Vec<Cell> = line.into_iter().map(Token::into_cell).collect();
                self.set_info_cells(&label, cells);
            }
            if !terminated {
                return Err(ScanError::MissingRuler.into());
            }
        }

        let mut count = 0usize;
        for line in iter {
            while self.ncols() < line.len() {
                let name = format!("column_{}", self.ncols());
                self.add_column(&name, None)?;
            }
            let cells: Vec<Cell> = line.into_iter().map(Token::into_cell).collect();
            self.push_row_positional(cells);
            count += 1;
        }
        Ok(count)
    }

    /// Scans config-style text (`#` comments) into this table.
    pub fn scan_config(&mut self, text: &str, opts: &ScanOptions) -> Result<usize, TableError> {
        let lines = tokenize(text, &opts.seps, opts.multisep, CommentMode::Hash)
            .map_err(TableError::from)?;
        let mut count = 0usize;
        for line in lines {
            while self.ncols() < line.len() {
                let name = format!("column_{}", self.ncols());
                self.add_column(&name, None)?;
            }
            let cells: Vec<Cell> = line.into_iter().map(Token::into_cell).collect();
            self.push_row_positional(cells);
            count += 1;
        }
        Ok(count)
    }
}
