use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    Unterminated { position: usize },
    EmptyName { position: usize },
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::Unterminated { position } => {
                write!(f, "unterminated placeholder starting at byte {position}")
            }
            ParamError::EmptyName { position } => {
                write!(f, "placeholder at byte {position} has no name")
            }
        }
    }
}

impl std::error::Error for ParamError {}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `{name}` or `{name=default}`, may sit inside a segment.
    Brace,
    /// `:name`, always spans a whole `/`-delimited segment.
    Colon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub default: Option<String>,
    pub style: PlaceholderStyle,
}

impl Placeholder {
    /// The text left in place when the placeholder cannot be resolved.
    pub fn literal(&self) -> String {
        match self.style {
            PlaceholderStyle::Brace => format!("{{{}}}", self.name),
            PlaceholderStyle::Colon => format!(":{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Literal(String),
    Placeholder(Placeholder),
}

/// A path segment or query value split into literal and placeholder parts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Pattern {
    pub parts: Vec<Part>,
}

impl Pattern {
    /// Split `raw` on `{name}` and `{name=default}` placeholders. `offset` is
    /// the byte position of `raw` in the whole template, for error reporting.
    fn parse_braces(raw: &str, offset: usize) -> Result<Self, ParamError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;
        let mut pos = offset;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                return Err(ParamError::Unterminated {
                    position: pos + open,
                });
            };
            let body = &after[..close];
            let (name, default) = match body.split_once('=') {
                Some((n, d)) => (n.trim(), Some(d.to_string())),
                None => (body.trim(), None),
            };
            if name.is_empty() {
                return Err(ParamError::EmptyName {
                    position: pos + open,
                });
            }
            if !literal.is_empty() {
                parts.push(Part::Literal(std::mem::take(&mut literal)));
            }
            parts.push(Part::Placeholder(Placeholder {
                name: name.to_string(),
                default,
                style: PlaceholderStyle::Brace,
            }));
            let consumed = open + 1 + close + 1;
            pos += consumed;
            rest = &rest[consumed..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }
        Ok(Self { parts })
    }

    /// One `/`-delimited path segment: either a whole-segment `:name` or
    /// any mix of literal text and brace placeholders.
    fn parse_segment(raw: &str, offset: usize) -> Result<Self, ParamError> {
        if let Some(name) = raw.strip_prefix(':')
            && !name.is_empty()
        {
            // The whole segment names the parameter: `:id-other` is `id-other`.
            return Ok(Self {
                parts: vec![Part::Placeholder(Placeholder {
                    name: name.to_string(),
                    default: None,
                    style: PlaceholderStyle::Colon,
                })],
            });
        }
        Self::parse_braces(raw, offset)
    }

    /// Placeholders in the order they appear.
    pub fn placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.parts.iter().filter_map(|p| match p {
            Part::Placeholder(ph) => Some(ph),
            Part::Literal(_) => None,
        })
    }

    /// No placeholders at all.
    pub fn is_literal(&self) -> bool {
        self.placeholders().next().is_none()
    }

    /// A single placeholder with nothing around it.
    pub fn sole_placeholder(&self) -> Option<&Placeholder> {
        match self.parts.as_slice() {
            [Part::Placeholder(ph)] => Some(ph),
            _ => None,
        }
    }

    /// Render with `value` supplying already-encoded text per placeholder;
    /// unresolved placeholders keep their literal form.
    pub fn render(&self, mut value: impl FnMut(&Placeholder) -> Option<String>) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(l) => out.push_str(l),
                Part::Placeholder(ph) => match value(ph) {
                    Some(v) => out.push_str(&v),
                    None => out.push_str(&ph.literal()),
                },
            }
        }
        out
    }

    /// Match `input` against this pattern, returning the raw text captured by
    /// each placeholder. Captures are non-empty and the shortest match wins.
    pub fn capture(&self, input: &str) -> Option<Vec<(String, String)>> {
        let mut out = Vec::new();
        capture_parts(&self.parts, input, &mut out).then_some(out)
    }
}

/// Backtracking matcher behind [`Pattern::capture`]. Each placeholder tries
/// the shortest non-empty prefix first; a trailing placeholder takes the rest.
fn capture_parts(parts: &[Part], input: &str, out: &mut Vec<(String, String)>) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return input.is_empty();
    };
    match first {
        Part::Literal(l) => match input.strip_prefix(l.as_str()) {
            Some(remaining) => capture_parts(rest, remaining, out),
            None => false,
        },
        Part::Placeholder(ph) => {
            let ends = input
                .char_indices()
                .map(|(i, _)| i)
                .skip(1)
                .chain(std::iter::once(input.len()));
            for end in ends {
                if end == 0 || (rest.is_empty() && end != input.len()) {
                    continue;
                }
                out.push((ph.name.clone(), input[..end].to_string()));
                if capture_parts(rest, &input[end..], out) {
                    return true;
                }
                out.pop();
            }
            false
        }
    }
}

/// One `key=value` of the query; only the value may hold placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPair {
    pub key: String,
    pub value: Pattern,
}

/// A parsed endpoint template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTemplate {
    raw: String,
    origin: String,
    path_raw: String,
    segments: Vec<Pattern>,
    query: Option<Vec<QueryPair>>,
}

impl EndpointTemplate {
    /// Parse `raw`, dropping any `#fragment`. The query keeps its pair
    /// order; `None` means the template has no `?` at all.
    pub fn parse(raw: &str) -> Result<Self, ParamError> {
        let (without_fragment, _) = raw.split_once('#').unwrap_or((raw, ""));
        let (origin, rest) = split_origin(without_fragment);
        let (path_raw, query_raw) = match rest.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (rest, None),
        };

        let mut segments = Vec::new();
        let mut offset = origin.len();
        for seg in path_raw.split('/') {
            segments.push(Pattern::parse_segment(seg, offset)?);
            offset += seg.len() + 1;
        }

        let query = match query_raw {
            None => None,
            Some(q) => {
                let mut offset = origin.len() + path_raw.len() + 1;
                let mut pairs = Vec::new();
                for piece in q.split('&') {
                    if !piece.is_empty() {
                        let (key, value) = piece.split_once('=').unwrap_or((piece, ""));
                        pairs.push(QueryPair {
                            key: key.to_string(),
                            value: Pattern::parse_braces(value, offset + key.len() + 1)?,
                        });
                    }
                    offset += piece.len() + 1;
                }
                Some(pairs)
            }
        };

        Ok(Self {
            raw: raw.to_string(),
            origin: origin.to_string(),
            path_raw: path_raw.to_string(),
            segments,
            query,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Origin plus the unresolved path, e.g. `/users/{id}/orders/:orderId`.
    pub fn path(&self) -> String {
        format!("{}{}", self.origin, self.path_raw)
    }

    pub fn segments(&self) -> &[Pattern] {
        &self.segments
    }

    pub fn query(&self) -> Option<&[QueryPair]> {
        self.query.as_deref()
    }

    pub fn path_placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.segments.iter().flat_map(Pattern::placeholders)
    }

    pub fn query_placeholders(&self) -> impl Iterator<Item = &Placeholder> {
        self.query
            .iter()
            .flatten()
            .flat_map(|pair| pair.value.placeholders())
    }

    /// Every placeholder name in order of first appearance.
    pub fn placeholder_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for ph in self.path_placeholders().chain(self.query_placeholders()) {
            if !names.contains(&ph.name.as_str()) {
                names.push(&ph.name);
            }
        }
        names
    }

    pub fn is_static(&self) -> bool {
        self.path_placeholders().next().is_none() && self.query_placeholders().next().is_none()
    }
}

/// Split `scheme://authority` off the front; the origin never holds placeholders.
pub(crate) fn split_origin(raw: &str) -> (&str, &str) {
    let Some(scheme_end) = raw.find("://") else {
        return ("", raw);
    };
    let authority_start = scheme_end + 3;
    match raw[authority_start..].find(['/', '?']) {
        Some(i) => raw.split_at(authority_start + i),
        None => (raw, ""),
    }
}
