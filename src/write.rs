use {
    crate::{
        fields::{self, Field},
        flatten::{self, FieldError},
        options::{CsvWriteOptions, WriteFields},
        scalar,
    },
    itertools::Itertools,
    serde::Serialize,
    serde_json::Value,
    std::{borrow::Cow, io::Write},
    tap::Pipe,
    tracing::instrument,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("deriving fields from the input records")]
    DerivingFields(#[from] fields::Error),
    #[error("reading record #{record}")]
    FieldAccess {
        record: usize,
        #[source]
        source: FieldError,
    },
    #[error("serializing a nested value to text")]
    SerializingValue(#[source] serde_json::Error),
    #[error("serializing a record to a value tree")]
    SerializingRecord(#[source] serde_json::Error),
    #[error("writing csv output")]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, self::Error>;

fn resolve_fields(
    selection: WriteFields,
    records: &[Value],
    options: &CsvWriteOptions,
) -> Result<Vec<Field>> {
    match selection {
        WriteFields::TopLevel => fields::top_level(records)?,
        WriteFields::Nested => fields::nested(records, &options.path_syntax)?,
        WriteFields::Explicit(fields) => fields,
        WriteFields::Derive(derive) => derive(records),
    }
    .pipe(Ok)
}

fn push_line<'a>(
    out: &mut String,
    mut cells: impl Iterator<Item = Cow<'a, str>>,
    delimiter: &str,
    eol: &str,
) {
    out.push_str(&cells.join(delimiter));
    out.push_str(eol);
}

fn header_line(fields: &[Field], options: &CsvWriteOptions, delimiter: &str) -> String {
    let mut line = String::new();
    push_line(
        &mut line,
        fields
            .iter()
            .map(|field| scalar::encode_text(field.name(), options.delimiter)),
        delimiter,
        &options.eol,
    );
    line
}

fn record_line(
    record: &Value,
    index: usize,
    fields: &[Field],
    options: &CsvWriteOptions,
    delimiter: &str,
) -> Result<String> {
    let row = flatten::record_to_row(record, fields)
        .map_err(|source| Error::FieldAccess { record: index, source })?;
    let cells = row
        .iter()
        .map(|value| scalar::encode(value, options.delimiter))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::SerializingValue)?;
    let mut line = String::new();
    push_line(&mut line, cells.into_iter(), delimiter, &options.eol);
    Ok(line)
}

/// Serializes records into delimited text, one line per record, with the
/// column-name line first when the header is enabled.
///
/// The field list is resolved from all the given records, so sparse or
/// heterogeneous inputs get the union of their columns. Zero records come
/// out as a single blank line.
#[instrument(skip_all, fields(records = records.len()))]
pub fn to_csv(records: &[Value], mut options: CsvWriteOptions) -> Result<String> {
    let fields = resolve_fields(std::mem::take(&mut options.fields), records, &options)?;
    let delimiter = options.delimiter.to_string();
    let mut out = String::new();
    if options.header {
        out.push_str(&header_line(&fields, &options, &delimiter));
    }
    for (index, record) in records.iter().enumerate() {
        out.push_str(&record_line(record, index, &fields, &options, &delimiter)?);
    }
    if out.is_empty() {
        out.push_str(&options.eol);
    }
    Ok(out)
}

/// Serializes any `Serialize` items through the codec, going by way of their
/// value trees.
pub fn serialize_to_csv<T: Serialize>(items: &[T], options: CsvWriteOptions) -> Result<String> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(Error::SerializingRecord))
        .collect::<Result<Vec<_>>>()
        .and_then(|records| to_csv(&records, options))
}

/// Incremental writer: emits one line per record as it arrives.
///
/// When no field list was supplied, it is resolved from the first record
/// written; nothing else is buffered, so the output is usable as a lazy
/// stream of lines.
pub struct CsvWriter<W: Write> {
    writer: W,
    options: CsvWriteOptions,
    fields: Option<Vec<Field>>,
    delimiter: String,
    count: usize,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(writer: W, options: CsvWriteOptions) -> Self {
        Self {
            writer,
            delimiter: options.delimiter.to_string(),
            options,
            fields: None,
            count: 0,
        }
    }

    fn resolve(&mut self, records: &[Value]) -> Result<()> {
        if self.fields.is_some() {
            return Ok(());
        }
        let fields = resolve_fields(std::mem::take(&mut self.options.fields), records, &self.options)?;
        if self.options.header {
            self.writer
                .write_all(header_line(&fields, &self.options, &self.delimiter).as_bytes())?;
        }
        self.fields = Some(fields);
        Ok(())
    }

    pub fn write_record(&mut self, record: &Value) -> Result<()> {
        self.resolve(std::slice::from_ref(record))?;
        let fields = self.fields.as_deref().expect("resolved above");
        let line = record_line(record, self.count, fields, &self.options, &self.delimiter)?;
        self.writer.write_all(line.as_bytes())?;
        self.count += 1;
        Ok(())
    }

    pub fn serialize<T: Serialize>(&mut self, item: &T) -> Result<()> {
        serde_json::to_value(item)
            .map_err(Error::SerializingRecord)
            .and_then(|record| self.write_record(&record))
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    /// Completes the stream and hands the sink back. A writer that never saw
    /// a record still emits its header line, or the single blank line that
    /// marks an empty table.
    pub fn finish(mut self) -> Result<W> {
        self.resolve(&[])?;
        if self.count == 0 && !self.options.header {
            self.writer.write_all(self.options.eol.as_bytes())?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
