use {
    crate::{
        field_path::{FieldPath, Segment},
        fields::{AccessError, Field},
    },
    serde_json::Value,
    tap::Pipe,
};

#[extension_traits::extension(pub trait ValueExt)]
impl serde_json::Value {
    fn at_path(&self, path: &FieldPath<'_>) -> Option<&serde_json::Value> {
        path.segments()
            .iter()
            .try_fold(self, |value, segment| match segment {
                Segment::Idx(idx) => value.as_array()?.get(*idx),
                Segment::Key(key) => value.as_object()?.get(key.as_ref()),
            })
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::String(_) => "a string",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("found {found}, expected an object or null")]
    ExpectedObject { found: &'static str },
    #[error("found {found}, expected an array or null")]
    ExpectedArray { found: &'static str },
}

/// A failed read or write of a single column.
#[derive(Debug, thiserror::Error)]
#[error("field '{field}'")]
pub struct FieldError {
    pub field: String,
    #[source]
    pub source: AccessError,
}

struct ValueBuilder<'a>(&'a mut Value);

impl ValueBuilder<'_> {
    fn make_object(&mut self) -> Result<&mut serde_json::Map<String, Value>, ApplyError> {
        match &*self.0 {
            Value::Object(_) => {}
            Value::Null => *self.0 = Value::Object(Default::default()),
            other => return Err(ApplyError::ExpectedObject { found: other.kind() }),
        };
        match &mut *self.0 {
            Value::Object(map) => Ok(map),
            _ => unreachable!("made into an object above"),
        }
    }

    fn make_array(&mut self) -> Result<&mut Vec<Value>, ApplyError> {
        match &*self.0 {
            Value::Array(_) => {}
            Value::Null => *self.0 = Value::Array(Default::default()),
            other => return Err(ApplyError::ExpectedArray { found: other.kind() }),
        };
        match &mut *self.0 {
            Value::Array(items) => Ok(items),
            _ => unreachable!("made into an array above"),
        }
    }

    fn apply(&mut self, path: &[Segment<'_>], value: Value) -> Result<(), ApplyError> {
        match path.split_first() {
            None => {
                *self.0 = value;
                Ok(())
            }
            Some((Segment::Key(key), rest)) => self.make_object().and_then(|map| {
                map.entry(key.as_ref())
                    .or_insert(Value::Null)
                    .pipe(ValueBuilder)
                    .apply(rest, value)
            }),
            Some((Segment::Idx(idx), rest)) => self.make_array().and_then(|items| {
                while items.len() <= *idx {
                    items.push(Value::Null);
                }
                ValueBuilder(&mut items[*idx]).apply(rest, value)
            }),
        }
    }
}

/// Writes `value` into `record` at `path`, creating the intermediate
/// containers along the way; arrays are padded with nulls up to the index.
pub fn apply_at_path(
    record: &mut Value,
    path: &FieldPath<'_>,
    value: Value,
) -> Result<(), ApplyError> {
    ValueBuilder(record).apply(path.segments(), value)
}

/// Reads one value per field out of `record`; a missing path reads as null.
pub fn record_to_row(record: &Value, fields: &[Field]) -> Result<Vec<Value>, FieldError> {
    fields
        .iter()
        .map(|field| {
            field.get(record).map_err(|source| FieldError {
                field: field.name().to_string(),
                source,
            })
        })
        .collect()
}

/// The inverse of [`record_to_row`]: assembles a fresh record by handing
/// every cell to its field's setter. `row` and `fields` are aligned by
/// position.
pub fn row_into_record(row: Vec<Value>, fields: &[Field]) -> Result<Value, FieldError> {
    let mut record = Value::Object(Default::default());
    fields
        .iter()
        .zip(row)
        .try_for_each(|(field, value)| {
            field.set(&mut record, value).map_err(|source| FieldError {
                field: field.name().to_string(),
                source,
            })
        })
        .map(|()| record)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{field_path::PathSyntax, fields},
        serde_json::json,
    };

    fn parse(name: &str) -> FieldPath<'_> {
        FieldPath::parse(name, &PathSyntax::default())
    }

    #[test]
    fn test_apply_builds_nested_containers() {
        let mut record = Value::Object(Default::default());
        apply_at_path(&mut record, &parse("details.address.city"), json!("Rotterdam")).unwrap();
        apply_at_path(&mut record, &parse("details.location.0"), json!(51.9280712)).unwrap();
        apply_at_path(&mut record, &parse("details.location.1"), json!(4.4207888)).unwrap();
        assert_eq!(
            record,
            json!({
                "details": {
                    "address": {"city": "Rotterdam"},
                    "location": [51.9280712, 4.4207888]
                }
            })
        );
    }

    #[test]
    fn test_apply_pads_sparse_arrays() {
        let mut record = Value::Object(Default::default());
        apply_at_path(&mut record, &parse("items.2"), json!("late")).unwrap();
        assert_eq!(record, json!({"items": [null, null, "late"]}));
    }

    #[test]
    fn test_apply_rejects_container_conflicts() {
        let mut record = Value::Object(Default::default());
        apply_at_path(&mut record, &parse("a.b"), json!(1)).unwrap();
        let error = apply_at_path(&mut record, &parse("a.0"), json!(2)).unwrap_err();
        assert!(matches!(error, ApplyError::ExpectedArray { found: "an object" }));
    }

    #[test]
    fn test_round_trip_through_fields() {
        let record = json!({
            "name": "Joe",
            "details": {"address": {"city": "Rotterdam"}, "location": [51.9, 4.4]}
        });
        let syntax = PathSyntax::default();
        let fields = fields::nested(std::slice::from_ref(&record), &syntax).unwrap();
        let row = record_to_row(&record, &fields).unwrap();
        assert_eq!(row, vec![json!("Joe"), json!("Rotterdam"), json!(51.9), json!(4.4)]);
        assert_eq!(row_into_record(row, &fields).unwrap(), record);
    }

    #[test]
    fn test_missing_paths_read_as_null() {
        let fields = fields::flat_from_names(["id".to_string(), "name".to_string()]);
        let row = record_to_row(&json!({"id": 1}), &fields).unwrap();
        assert_eq!(row, vec![json!(1), json!(null)]);
    }
}
