use {
    crate::{
        fields::{self, Field},
        flatten::{self, FieldError},
        options::{CsvReadOptions, PathSyntax, ReadFields},
        scalar::{self, QUOTE, RawCell},
    },
    serde::de::DeserializeOwned,
    serde_json::Value,
    tap::Pipe,
    tracing::instrument,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("the quoted field opened at line {line}, column {column} never closes")]
    UnterminatedQuote { line: usize, column: usize },
    #[error("row at line {line} has {found} fields, expected {expected}")]
    RowWidth {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("no column named '{name}' in the header")]
    UnknownColumn { name: String },
    #[error("building record #{record}")]
    FieldAccess {
        record: usize,
        #[source]
        source: FieldError,
    },
    #[error("deserializing record #{record} from its value tree")]
    DeserializingRecord {
        record: usize,
        #[source]
        source: serde_json::Error,
    },
}

type Result<T> = std::result::Result<T, self::Error>;

#[derive(Debug)]
struct RawRow {
    cells: Vec<RawCell>,
    line: usize,
}

/// Splits text into rows of raw cells. Quoted cells may contain the
/// delimiter and line breaks, a doubled quote decodes to one. Rows end at
/// `\r\n`, `\n` or a lone `\r` regardless of the configured eol; completely
/// blank lines produce no row.
fn split_rows(text: &str, delimiter: char) -> Result<Vec<RawRow>> {
    let mut rows = Vec::new();
    let mut cells: Vec<RawCell> = Vec::new();
    let mut cell = RawCell::default();
    let mut in_quotes = false;
    let mut quote_opened = (0usize, 0usize);
    let mut line = 1usize;
    let mut column = 0usize;
    let mut row_line = 1usize;
    let mut row_has_content = false;
    let mut chars = text.chars().peekable();

    macro_rules! end_row {
        () => {{
            if row_has_content {
                cells.push(std::mem::take(&mut cell));
                rows.push(RawRow {
                    cells: std::mem::take(&mut cells),
                    line: row_line,
                });
            }
            row_has_content = false;
            line += 1;
            column = 0;
            row_line = line;
        }};
    }

    while let Some(c) = chars.next() {
        column += 1;
        if in_quotes {
            match c {
                QUOTE => match chars.peek() {
                    Some(&QUOTE) => {
                        cell.text.push(QUOTE);
                        chars.next();
                        column += 1;
                    }
                    _ => in_quotes = false,
                },
                '\n' => {
                    cell.text.push(c);
                    line += 1;
                    column = 0;
                }
                c => cell.text.push(c),
            }
            continue;
        }
        match c {
            QUOTE if cell.text.is_empty() && !cell.quoted => {
                cell.quoted = true;
                in_quotes = true;
                quote_opened = (line, column);
                row_has_content = true;
            }
            // a stray quote mid-cell is kept literally
            QUOTE => {
                cell.text.push(QUOTE);
                row_has_content = true;
            }
            c if c == delimiter => {
                cells.push(std::mem::take(&mut cell));
                row_has_content = true;
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                end_row!();
            }
            '\n' => end_row!(),
            c => {
                cell.text.push(c);
                row_has_content = true;
            }
        }
    }
    if in_quotes {
        return Err(Error::UnterminatedQuote {
            line: quote_opened.0,
            column: quote_opened.1,
        });
    }
    if row_has_content {
        cells.push(std::mem::take(&mut cell));
        rows.push(RawRow {
            cells,
            line: row_line,
        });
    }
    Ok(rows)
}

fn bind_fields(
    selection: ReadFields,
    names: Vec<String>,
    by_name: bool,
    syntax: &PathSyntax,
) -> Result<(Vec<usize>, Vec<Field>)> {
    match selection {
        ReadFields::Flat => ((0..names.len()).collect(), fields::flat_from_names(names)).pipe(Ok),
        ReadFields::Nested => ((0..names.len()).collect(), fields::nested_from_names(names, syntax))
            .pipe(Ok),
        ReadFields::Explicit(fields) => bind_columns(fields, &names, by_name),
        ReadFields::Derive(derive) => derive(&names).pipe(|fields| bind_columns(fields, &names, by_name)),
    }
}

/// Caller-supplied fields bind to columns by header name, or by position
/// when the input carries no header. Columns no field asked for are skipped.
fn bind_columns(
    fields: Vec<Field>,
    names: &[String],
    by_name: bool,
) -> Result<(Vec<usize>, Vec<Field>)> {
    fields
        .into_iter()
        .enumerate()
        .map(|(position, field)| {
            match by_name {
                true => names.iter().position(|name| name == field.name()),
                false => (position < names.len()).then_some(position),
            }
            .ok_or_else(|| Error::UnknownColumn {
                name: field.name().to_string(),
            })
            .map(|column| (column, field))
        })
        .collect::<Result<Vec<_>>>()
        .map(|bound| bound.into_iter().unzip())
}

/// Parses delimited text back into records.
///
/// The first row supplies the column names when the header is enabled;
/// otherwise positional names `Field 0`, `Field 1`, ... are generated from
/// the first row's width. Every data row must match that width; a mismatch
/// fails the whole parse.
#[instrument(skip_all, fields(bytes = text.len()))]
pub fn from_csv(text: &str, options: CsvReadOptions) -> Result<Vec<Value>> {
    let CsvReadOptions {
        header,
        delimiter,
        fields,
        path_syntax,
    } = options;
    let mut rows = split_rows(text, delimiter)?;
    let names = match header {
        true => match rows.is_empty() {
            true => return Ok(Vec::new()),
            false => rows
                .remove(0)
                .cells
                .into_iter()
                .map(|cell| cell.text)
                .collect::<Vec<_>>(),
        },
        false => (0..rows.first().map(|row| row.cells.len()).unwrap_or(0))
            .map(|idx| format!("Field {idx}"))
            .collect(),
    };
    let width = names.len();
    let (columns, fields) = bind_fields(fields, names, header, &path_syntax)?;
    tracing::debug!(rows = rows.len(), fields = fields.len(), "decoded raw rows");
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            if row.cells.len() != width {
                return Err(Error::RowWidth {
                    line: row.line,
                    expected: width,
                    found: row.cells.len(),
                });
            }
            columns
                .iter()
                .map(|column| scalar::decode(&row.cells[*column]))
                .collect::<Vec<_>>()
                .pipe(|values| flatten::row_into_record(values, &fields))
                .map_err(|source| Error::FieldAccess { record: index, source })
        })
        .collect()
}

/// Parses delimited text straight into any `DeserializeOwned` type, going
/// by way of the record value trees.
pub fn deserialize_from_csv<T: DeserializeOwned>(
    text: &str,
    options: CsvReadOptions,
) -> Result<Vec<T>> {
    from_csv(text, options)?
        .into_iter()
        .enumerate()
        .map(|(record, value)| {
            serde_json::from_value(value)
                .map_err(|source| Error::DeserializingRecord { record, source })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(row: &RawRow) -> Vec<&str> {
        row.cells.iter().map(|cell| cell.text.as_str()).collect()
    }

    #[test]
    fn test_split_plain_rows() {
        let rows = split_rows("id,name\r\n1,Joe\r\n", ',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(cells(&rows[0]), ["id", "name"]);
        assert_eq!(cells(&rows[1]), ["1", "Joe"]);
    }

    #[test]
    fn test_quoted_cells_swallow_delimiters_and_line_breaks() {
        let rows = split_rows("\"Joe,Jones\",\"line\nbreak\"\r\n", ',').unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(cells(&rows[0]), ["Joe,Jones", "line\nbreak"]);
        assert!(rows[0].cells.iter().all(|cell| cell.quoted));
    }

    #[test]
    fn test_doubled_quotes_decode_to_one() {
        let rows = split_rows("\"\"\"Big\"\" Joe\"\r\n", ',').unwrap();
        assert_eq!(cells(&rows[0]), ["\"Big\" Joe"]);
    }

    #[test]
    fn test_empty_quoted_cell_keeps_its_flag() {
        let rows = split_rows("a,\"\"\r\n", ',').unwrap();
        assert_eq!(rows[0].cells[1], RawCell { text: String::new(), quoted: true });
        assert!(!rows[0].cells[0].quoted);
    }

    #[test]
    fn test_blank_lines_produce_no_rows() {
        let rows = split_rows("\r\n\r\na\r\n\r\n", ',').unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 3);
    }

    #[test]
    fn test_every_line_break_flavor_ends_a_row() {
        let rows = split_rows("a\r\nb\nc\rd", ',').unwrap();
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn test_unterminated_quote_reports_where_it_opened() {
        let error = split_rows("a,b\r\n1,\"oops", ',').unwrap_err();
        assert!(matches!(error, Error::UnterminatedQuote { line: 2, column: 3 }));
    }
}
