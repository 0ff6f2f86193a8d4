//! A bidirectional codec between nested records (`serde_json::Value`
//! objects) and delimited text. Nested structures flatten into path-named
//! columns and are rebuilt when parsing; quoting keeps the round trip
//! lossless for values containing the delimiter, quotes or line breaks.

pub mod field_path;
pub mod fields;
pub mod flatten;
pub mod options;
pub mod read;
pub mod scalar;
pub mod write;

pub use {
    fields::Field,
    options::{CsvReadOptions, CsvWriteOptions, PathSyntax, ReadFields, WriteFields},
    read::{deserialize_from_csv, from_csv},
    write::{CsvWriter, serialize_to_csv, to_csv},
};
