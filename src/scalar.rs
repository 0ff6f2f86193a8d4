use {
    serde_json::Value,
    std::borrow::Cow,
    tap::{Pipe, Tap},
};

pub const QUOTE: char = '"';

/// One decoded cell as it appeared in the text, before any type
/// interpretation. The `quoted` flag survives so that `""` (an empty string)
/// stays distinguishable from an empty cell (null).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawCell {
    pub text: String,
    pub quoted: bool,
}

/// Encodes one value as cell text, quoting included.
///
/// Null becomes the empty cell, booleans and numbers their plain decimal
/// text. Strings pass through [`encode_text`]. A nested object or array that
/// was not broken up by any field becomes its compact JSON text.
pub fn encode(value: &Value, delimiter: char) -> Result<Cow<'_, str>, serde_json::Error> {
    match value {
        Value::Null => Cow::Borrowed("").pipe(Ok),
        Value::Bool(true) => Cow::Borrowed("true").pipe(Ok),
        Value::Bool(false) => Cow::Borrowed("false").pipe(Ok),
        Value::Number(number) => number.to_string().pipe(Cow::<str>::Owned).pipe(Ok),
        Value::String(text) => encode_text(text, delimiter).pipe(Ok),
        nested => serde_json::to_string(nested)
            .map(|json| encode_text(&json, delimiter).into_owned().pipe(Cow::Owned)),
    }
}

/// Wraps a textual cell in quotes when it collides with the format's control
/// characters, doubling every inner quote. The empty string is quoted too,
/// which keeps it apart from the empty cell that encodes null.
pub fn encode_text(text: &str, delimiter: char) -> Cow<'_, str> {
    let colliding = text
        .chars()
        .any(|c| c == delimiter || matches!(c, QUOTE | '\n' | '\r'));
    match colliding || text.is_empty() {
        false => Cow::Borrowed(text),
        true => String::with_capacity(text.len() + 2)
            .tap_mut(|out| {
                out.push(QUOTE);
                text.chars().for_each(|c| {
                    if c == QUOTE {
                        out.push(QUOTE);
                    }
                    out.push(c);
                });
                out.push(QUOTE);
            })
            .pipe(Cow::Owned),
    }
}

/// Decodes one cell back into a value.
///
/// Unquoted cells are inferred: empty and `null` read as null, `true`/`false`
/// as booleans, JSON-shaped numbers as numbers, and `{...}`/`[...]` text as
/// the nested value it serializes. Quoted cells stay strings, except for
/// JSON container text, which is restored so nested values survive the round
/// trip.
pub fn decode(cell: &RawCell) -> Value {
    match cell.quoted {
        true => restore_container(&cell.text)
            .unwrap_or_else(|| Value::String(cell.text.clone())),
        false => match cell.text.as_str() {
            "" | "null" => Value::Null,
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            text => decode_number(text)
                .map(Value::Number)
                .or_else(|| restore_container(text))
                .unwrap_or_else(|| Value::String(text.to_string())),
        },
    }
}

/// Numbers are recognized by JSON's grammar, not by what `f64` parsing
/// accepts: `inf`, `NaN` and a leading `+` all stay strings.
fn decode_number(text: &str) -> Option<serde_json::Number> {
    text.bytes()
        .next()
        .filter(|b| b.is_ascii_digit() || *b == b'-')?;
    text.parse::<i64>()
        .ok()
        .map(serde_json::Number::from)
        .or_else(|| {
            text.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(serde_json::Number::from_f64)
        })
}

fn restore_container(text: &str) -> Option<Value> {
    text.starts_with(['{', '['])
        .then(|| serde_json::from_str(text).ok())
        .flatten()
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn unquoted(text: &str) -> RawCell {
        RawCell {
            text: text.to_string(),
            quoted: false,
        }
    }

    fn quoted(text: &str) -> RawCell {
        RawCell {
            text: text.to_string(),
            quoted: true,
        }
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encode(&json!(null), ',').unwrap(), "");
        assert_eq!(encode(&json!(true), ',').unwrap(), "true");
        assert_eq!(encode(&json!(42), ',').unwrap(), "42");
        assert_eq!(encode(&json!(51.9280712), ',').unwrap(), "51.9280712");
        assert_eq!(encode(&json!("hi"), ',').unwrap(), "hi");
    }

    #[test]
    fn test_encode_quotes_collisions() {
        assert_eq!(encode(&json!("Joe,Jones"), ',').unwrap(), "\"Joe,Jones\"");
        assert_eq!(encode(&json!("\"Big\" Joe"), ',').unwrap(), "\"\"\"Big\"\" Joe\"");
        assert_eq!(encode(&json!("Joe\nJones"), ',').unwrap(), "\"Joe\nJones\"");
        assert_eq!(encode(&json!(""), ',').unwrap(), "\"\"");
        // with a custom delimiter the comma is an ordinary character
        assert_eq!(encode(&json!("Joe,Jones"), ';').unwrap(), "Joe,Jones");
    }

    #[test]
    fn test_encode_nested_values_as_json_text() {
        assert_eq!(
            encode(&json!({"key": "value"}), ',').unwrap(),
            "\"{\"\"key\"\":\"\"value\"\"}\""
        );
        assert_eq!(encode(&json!(["item1"]), ',').unwrap(), "\"[\"\"item1\"\"]\"");
    }

    #[test]
    fn test_decode_infers_unquoted_cells() {
        assert_eq!(decode(&unquoted("")), json!(null));
        assert_eq!(decode(&unquoted("null")), json!(null));
        assert_eq!(decode(&unquoted("true")), json!(true));
        assert_eq!(decode(&unquoted("42")), json!(42));
        assert_eq!(decode(&unquoted("-7")), json!(-7));
        assert_eq!(decode(&unquoted("51.9280712")), json!(51.9280712));
        assert_eq!(decode(&unquoted("hi")), json!("hi"));
        assert_eq!(decode(&unquoted("00123")).as_i64(), Some(123));
    }

    #[test]
    fn test_decode_rejects_lookalike_numbers() {
        assert_eq!(decode(&unquoted("inf")), json!("inf"));
        assert_eq!(decode(&unquoted("NaN")), json!("NaN"));
        assert_eq!(decode(&unquoted("+42")), json!("+42"));
        assert_eq!(decode(&unquoted("-")), json!("-"));
    }

    #[test]
    fn test_decode_keeps_quoted_cells_textual() {
        assert_eq!(decode(&quoted("")), json!(""));
        assert_eq!(decode(&quoted("true")), json!("true"));
        assert_eq!(decode(&quoted("42")), json!("42"));
        assert_eq!(decode(&quoted("\"Big\" Joe")), json!("\"Big\" Joe"));
    }

    #[test]
    fn test_decode_restores_json_containers() {
        assert_eq!(decode(&quoted("{\"key\":\"value\"}")), json!({"key": "value"}));
        assert_eq!(decode(&quoted("[\"item1\"]")), json!(["item1"]));
        assert_eq!(decode(&quoted("{not json")), json!("{not json"));
    }
}
