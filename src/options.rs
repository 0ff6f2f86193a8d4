use {crate::fields::Field, serde_json::Value, std::fmt, tap::Tap};

pub use crate::field_path::PathSyntax;

pub const DEFAULT_DELIMITER: char = ',';
pub const DEFAULT_EOL: &str = "\r\n";

/// Where the column list comes from when serializing records.
#[derive(Default)]
pub enum WriteFields {
    /// One column per top-level key; nested containers serialize as JSON
    /// text. The default.
    #[default]
    TopLevel,
    /// One column per leaf, with path-derived names.
    Nested,
    /// The caller's own field list, used as-is and in the given order.
    Explicit(Vec<Field>),
    /// A hook computing the field list from the records about to be written.
    Derive(Box<dyn Fn(&[Value]) -> Vec<Field> + Send + Sync>),
}

impl fmt::Debug for WriteFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteFields::TopLevel => f.write_str("TopLevel"),
            WriteFields::Nested => f.write_str("Nested"),
            WriteFields::Explicit(fields) => f.debug_tuple("Explicit").field(fields).finish(),
            WriteFields::Derive(_) => f.write_str("Derive(..)"),
        }
    }
}

/// Where the column list comes from when parsing text.
#[derive(Default)]
pub enum ReadFields {
    /// Every column name is one opaque record key. The default.
    #[default]
    Flat,
    /// Column names are split into paths and the nested containers rebuilt.
    Nested,
    /// The caller's own field list, bound to columns by name when a header
    /// is present, by position otherwise.
    Explicit(Vec<Field>),
    /// A hook computing the field list from the column names.
    Derive(Box<dyn Fn(&[String]) -> Vec<Field> + Send + Sync>),
}

impl fmt::Debug for ReadFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadFields::Flat => f.write_str("Flat"),
            ReadFields::Nested => f.write_str("Nested"),
            ReadFields::Explicit(fields) => f.debug_tuple("Explicit").field(fields).finish(),
            ReadFields::Derive(_) => f.write_str("Derive(..)"),
        }
    }
}

#[derive(Debug)]
pub struct CsvWriteOptions {
    pub header: bool,
    pub delimiter: char,
    pub eol: String,
    pub fields: WriteFields,
    pub path_syntax: PathSyntax,
}

impl Default for CsvWriteOptions {
    fn default() -> Self {
        Self {
            header: true,
            delimiter: DEFAULT_DELIMITER,
            eol: DEFAULT_EOL.to_string(),
            fields: WriteFields::default(),
            path_syntax: PathSyntax::default(),
        }
    }
}

impl CsvWriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(self, header: bool) -> Self {
        self.tap_mut(|options| options.header = header)
    }

    pub fn with_delimiter(self, delimiter: char) -> Self {
        self.tap_mut(|options| options.delimiter = delimiter)
    }

    pub fn with_eol(self, eol: impl Into<String>) -> Self {
        self.tap_mut(|options| options.eol = eol.into())
    }

    pub fn with_fields(self, fields: WriteFields) -> Self {
        self.tap_mut(|options| options.fields = fields)
    }

    pub fn with_path_syntax(self, path_syntax: PathSyntax) -> Self {
        self.tap_mut(|options| options.path_syntax = path_syntax)
    }
}

#[derive(Debug)]
pub struct CsvReadOptions {
    pub header: bool,
    pub delimiter: char,
    pub fields: ReadFields,
    pub path_syntax: PathSyntax,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            header: true,
            delimiter: DEFAULT_DELIMITER,
            fields: ReadFields::default(),
            path_syntax: PathSyntax::default(),
        }
    }
}

impl CsvReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(self, header: bool) -> Self {
        self.tap_mut(|options| options.header = header)
    }

    pub fn with_delimiter(self, delimiter: char) -> Self {
        self.tap_mut(|options| options.delimiter = delimiter)
    }

    pub fn with_fields(self, fields: ReadFields) -> Self {
        self.tap_mut(|options| options.fields = fields)
    }

    pub fn with_path_syntax(self, path_syntax: PathSyntax) -> Self {
        self.tap_mut(|options| options.path_syntax = path_syntax)
    }
}
