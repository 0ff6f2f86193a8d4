use {
    crate::{
        field_path::{FieldPath, PathSyntax, Segment},
        flatten::{self, ValueExt},
    },
    indexmap::IndexSet,
    serde_json::Value,
    tap::Pipe,
};

/// Records are tree-shaped by construction, but nothing stops a caller from
/// feeding a pathologically deep one; descent stops here instead of blowing
/// the stack.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("record #{index} is not an object, found {found}")]
    NotARecord { index: usize, found: &'static str },
    #[error("record #{index} nests deeper than {} levels at '{path}'", MAX_DEPTH)]
    TooDeep { index: usize, path: String },
}

type Result<T> = std::result::Result<T, self::Error>;

pub type AccessError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type GetFn = Box<dyn Fn(&Value) -> std::result::Result<Value, AccessError> + Send + Sync>;
pub type SetFn =
    Box<dyn Fn(&mut Value, Value) -> std::result::Result<(), AccessError> + Send + Sync>;

/// One column of the table, paired with the logic that reads it out of a
/// record (serializing) or writes it back in (parsing).
///
/// A structural field walks a [`FieldPath`]; a custom field decouples the
/// column name from the record shape through caller-supplied accessors.
pub enum Field {
    Structural {
        name: String,
        path: FieldPath<'static>,
    },
    Custom {
        name: String,
        get: Option<GetFn>,
        set: Option<SetFn>,
    },
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Structural { name, path } => f
                .debug_struct("Structural")
                .field("name", name)
                .field("path", path)
                .finish(),
            Field::Custom { name, get, set } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("get", &get.is_some())
                .field("set", &set.is_some())
                .finish(),
        }
    }
}

impl Field {
    pub fn structural(path: FieldPath<'static>, syntax: &PathSyntax) -> Self {
        Field::Structural {
            name: path.stringify(syntax),
            path,
        }
    }

    /// A read-side custom field: the getter supplies the cell value.
    pub fn with_get(
        name: impl Into<String>,
        get: impl Fn(&Value) -> std::result::Result<Value, AccessError> + Send + Sync + 'static,
    ) -> Self {
        Field::Custom {
            name: name.into(),
            get: Some(Box::new(get)),
            set: None,
        }
    }

    /// A parse-side custom field: the setter receives the decoded cell value.
    pub fn with_set(
        name: impl Into<String>,
        set: impl Fn(&mut Value, Value) -> std::result::Result<(), AccessError> + Send + Sync + 'static,
    ) -> Self {
        Field::Custom {
            name: name.into(),
            get: None,
            set: Some(Box::new(set)),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Field::Structural { name, .. } | Field::Custom { name, .. } => name,
        }
    }

    pub(crate) fn get(&self, record: &Value) -> std::result::Result<Value, AccessError> {
        match self {
            Field::Structural { path, .. } => record
                .at_path(path)
                .cloned()
                .unwrap_or(Value::Null)
                .pipe(Ok),
            Field::Custom { get, .. } => {
                get.as_ref().map(|get| get(record)).unwrap_or(Ok(Value::Null))
            }
        }
    }

    pub(crate) fn set(
        &self,
        record: &mut Value,
        value: Value,
    ) -> std::result::Result<(), AccessError> {
        match self {
            Field::Structural { path, .. } => {
                flatten::apply_at_path(record, path, value).map_err(Into::into)
            }
            Field::Custom { set, .. } => {
                set.as_ref().map(|set| set(record, value)).unwrap_or(Ok(()))
            }
        }
    }
}

/// One column per top-level key, in first-seen order across the scanned
/// records. Nested containers stay whole and later serialize as JSON text.
pub fn top_level(records: &[Value]) -> Result<Vec<Field>> {
    let mut names = IndexSet::new();
    for (index, record) in records.iter().enumerate() {
        let map = record.as_object().ok_or_else(|| Error::NotARecord {
            index,
            found: record.kind(),
        })?;
        map.keys().for_each(|key| {
            names.insert(key.clone());
        });
    }
    names
        .into_iter()
        .map(|key| Field::Structural {
            path: FieldPath::root().join(Segment::key(key.clone())),
            name: key,
        })
        .collect::<Vec<_>>()
        .pipe(Ok)
}

/// One column per leaf path, descending into nested objects and arrays.
/// An empty object or array counts as a leaf and keeps its literal JSON
/// form. Paths are collected in first-seen order, deduplicated across
/// records, so sparse or heterogeneous inputs still produce a stable union.
pub fn nested(records: &[Value], syntax: &PathSyntax) -> Result<Vec<Field>> {
    let mut paths = IndexSet::new();
    for (index, record) in records.iter().enumerate() {
        let map = record.as_object().ok_or_else(|| Error::NotARecord {
            index,
            found: record.kind(),
        })?;
        for (key, child) in map {
            collect_leaf_paths(
                index,
                FieldPath::root().join(Segment::key(key.clone())),
                child,
                syntax,
                &mut paths,
            )?;
        }
    }
    paths
        .into_iter()
        .map(|path| Field::structural(path, syntax))
        .collect::<Vec<_>>()
        .pipe(Ok)
}

fn collect_leaf_paths(
    index: usize,
    prefix: FieldPath<'static>,
    value: &Value,
    syntax: &PathSyntax,
    out: &mut IndexSet<FieldPath<'static>>,
) -> Result<()> {
    if prefix.depth() > MAX_DEPTH {
        return Err(Error::TooDeep {
            index,
            path: prefix.stringify(syntax),
        });
    }
    match value {
        Value::Object(map) if !map.is_empty() => map.iter().try_for_each(|(key, child)| {
            collect_leaf_paths(
                index,
                prefix.join(Segment::key(key.clone())),
                child,
                syntax,
                out,
            )
        }),
        Value::Array(items) if !items.is_empty() => {
            items.iter().enumerate().try_for_each(|(idx, child)| {
                collect_leaf_paths(index, prefix.join(Segment::Idx(idx)), child, syntax, out)
            })
        }
        _leaf => out.insert(prefix).pipe(drop).pipe(Ok),
    }
}

/// Header names taken verbatim, one opaque key each.
pub fn flat_from_names(names: impl IntoIterator<Item = String>) -> Vec<Field> {
    names
        .into_iter()
        .map(|name| Field::Structural {
            path: FieldPath::root().join(Segment::key(name.clone())),
            name,
        })
        .collect()
}

/// Splits each header name on unescaped separators; purely numeric segments
/// address array elements, so the matching containers get rebuilt on parse.
pub fn nested_from_names(
    names: impl IntoIterator<Item = String>,
    syntax: &PathSyntax,
) -> Vec<Field> {
    names
        .into_iter()
        .map(|name| {
            FieldPath::parse(&name, syntax)
                .to_owned()
                .pipe(|path| Field::Structural { name, path })
        })
        .collect()
}
