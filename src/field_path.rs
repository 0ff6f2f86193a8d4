use {
    std::borrow::Cow,
    tap::{Pipe, Tap},
};

pub const DEFAULT_KEY_SEPARATOR: char = '.';
pub const DEFAULT_ESCAPE: char = '\\';

/// How path segments are joined into a column name and split back apart.
///
/// A separator occurring literally inside an object key is escaped with
/// `escape` when the path is stringified, so the name stays unambiguously
/// splittable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSyntax {
    pub separator: char,
    pub escape: char,
}

impl Default for PathSyntax {
    fn default() -> Self {
        Self {
            separator: DEFAULT_KEY_SEPARATOR,
            escape: DEFAULT_ESCAPE,
        }
    }
}

impl PathSyntax {
    pub fn separated_by(separator: char) -> Self {
        Self::default().tap_mut(|syntax| syntax.separator = separator)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment<'a> {
    Idx(usize),
    Key(Cow<'a, str>),
}

impl<'a> Segment<'a> {
    pub fn key(key: impl Into<Cow<'a, str>>) -> Self {
        Segment::Key(key.into())
    }

    /// Classifies an already-unescaped segment: purely numeric text addresses
    /// an array element, everything else is an object key. An object key that
    /// happens to be numeric is indistinguishable here and resolves to the
    /// array reading.
    pub fn from_raw(raw: Cow<'a, str>) -> Self {
        match !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            true => raw
                .parse::<usize>()
                .ok()
                .map(Segment::Idx)
                .unwrap_or_else(|| Segment::Key(raw)),
            false => Segment::Key(raw),
        }
    }

    pub fn to_owned(&self) -> Segment<'static> {
        match self {
            Segment::Idx(idx) => Segment::Idx(*idx),
            Segment::Key(cow) => cow.to_string().pipe(Cow::<str>::Owned).pipe(Segment::Key),
        }
    }

    fn push_escaped(&self, out: &mut String, syntax: &PathSyntax) {
        match self {
            Segment::Idx(idx) => out.push_str(&idx.to_string()),
            Segment::Key(key) => key.chars().for_each(|c| {
                if c == syntax.separator {
                    out.push(syntax.escape);
                }
                out.push(c);
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FieldPath<'a>(Vec<Segment<'a>>);

impl<'a> FieldPath<'a> {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn join(&self, segment: Segment<'a>) -> Self {
        self.clone().tap_mut(|path| path.0.push(segment))
    }

    pub fn segments(&self) -> &[Segment<'a>] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn to_owned(&self) -> FieldPath<'static> {
        self.0
            .iter()
            .map(Segment::to_owned)
            .collect::<Vec<_>>()
            .pipe(FieldPath)
    }

    /// Renders the path as a column name, escaping separator collisions
    /// inside key segments.
    pub fn stringify(&self, syntax: &PathSyntax) -> String {
        String::new().tap_mut(|out| {
            self.0.iter().enumerate().for_each(|(idx, segment)| {
                if idx > 0 {
                    out.push(syntax.separator);
                }
                segment.push_escaped(out, syntax);
            })
        })
    }

    /// Splits a column name back into segments. An escaped separator stays
    /// part of its segment; a lone escape character is kept literally.
    pub fn parse(name: &'a str, syntax: &PathSyntax) -> FieldPath<'a> {
        let mut segments = Vec::new();
        let mut buf = String::new();
        let mut start = 0usize;
        // current segment is still an untouched slice of `name`
        let mut clean = true;
        let mut chars = name.char_indices().peekable();
        while let Some((at, c)) = chars.next() {
            match c {
                c if c == syntax.escape
                    && matches!(chars.peek(), Some((_, next)) if *next == syntax.separator) =>
                {
                    if clean {
                        buf.push_str(&name[start..at]);
                        clean = false;
                    }
                    buf.push(syntax.separator);
                    chars.next();
                }
                c if c == syntax.separator => {
                    match clean {
                        true => Cow::Borrowed(&name[start..at]),
                        false => std::mem::take(&mut buf).pipe(Cow::Owned),
                    }
                    .pipe(Segment::from_raw)
                    .pipe(|segment| segments.push(segment));
                    start = at + c.len_utf8();
                    clean = true;
                }
                c => {
                    if !clean {
                        buf.push(c);
                    }
                }
            }
        }
        match clean {
            true => Cow::Borrowed(&name[start..]),
            false => buf.pipe(Cow::Owned),
        }
        .pipe(Segment::from_raw)
        .pipe(|segment| segments.push(segment));
        FieldPath(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> Segment<'_> {
        Segment::key(name)
    }

    #[test]
    fn test_stringify_escapes_the_separator() {
        let path = FieldPath::root().join(key("nested")).join(key("field.name"));
        assert_eq!(path.stringify(&PathSyntax::default()), "nested.field\\.name");
    }

    #[test]
    fn test_parse_inverts_stringify() {
        let syntax = PathSyntax::default();
        let path = FieldPath::root()
            .join(key("nested"))
            .join(key("field.name"))
            .join(Segment::Idx(2));
        assert_eq!(FieldPath::parse(&path.stringify(&syntax), &syntax), path);
    }

    #[test]
    fn test_escaped_separator_alone_is_a_single_segment() {
        let parsed = FieldPath::parse("\\.", &PathSyntax::default());
        assert_eq!(parsed, FieldPath::root().join(key(".")));
    }

    #[test]
    fn test_numeric_segments_address_arrays() {
        let parsed = FieldPath::parse("details.location.0", &PathSyntax::default());
        assert_eq!(
            parsed,
            FieldPath::root()
                .join(key("details"))
                .join(key("location"))
                .join(Segment::Idx(0))
        );
    }

    #[test]
    fn test_lone_escape_is_literal() {
        let syntax = PathSyntax::default();
        let path = FieldPath::root().join(key("a\\.b"));
        let name = path.stringify(&syntax);
        assert_eq!(name, "a\\\\.b");
        assert_eq!(FieldPath::parse(&name, &syntax), path);
    }

    #[test]
    fn test_custom_separator() {
        let syntax = PathSyntax::separated_by('_');
        let path = FieldPath::root().join(key("nested")).join(key("field_name"));
        assert_eq!(path.stringify(&syntax), "nested_field\\_name");
        assert_eq!(FieldPath::parse("nested_field\\_name", &syntax), path);
    }
}
