//! Macros: named, possibly multi-valued text that can be substituted into
//! keys and values as `$name` or `${name}`.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use tracing::{debug, trace};
use vec1::Vec1;

/// Built-in macros. Each use produces a fresh value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generator {
    NewUuid,
    NewUuidUrn,
    NewBnode,
    NewTimeUtc,
}

impl Generator {
    pub const ALL: [Generator; 4] = [
        Generator::NewUuid,
        Generator::NewUuidUrn,
        Generator::NewBnode,
        Generator::NewTimeUtc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Generator::NewUuid => "NEW_UUID",
            Generator::NewUuidUrn => "NEW_UUID_URN",
            Generator::NewBnode => "NEW_BNODE",
            Generator::NewTimeUtc => "NEW_TIME_UTC",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.name() == name)
    }

    pub fn generate(self) -> String {
        match self {
            Generator::NewUuid => uuid::Uuid::new_v4().to_string(),
            Generator::NewUuidUrn => uuid::Uuid::new_v4().urn().to_string(),
            Generator::NewBnode => format!("_:{}", oxrdf::BlankNode::default().as_str()),
            Generator::NewTimeUtc => Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// One value of a macro, as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroEntry {
    Text {
        value: String,
        /// Macros referenced by `value` that must be substituted before use.
        /// `None` when the declaration was not marked for dereferencing.
        pending: Option<IndexSet<String>>,
    },
    Generated(Generator),
}

impl MacroEntry {
    pub fn text(value: impl Into<String>, dereference: bool) -> Self {
        let value = value.into();
        let pending = dereference.then(|| {
            references(&value)
                .map(|(name, _)| name.to_string())
                .collect()
        });
        MacroEntry::Text { value, pending }
    }

    fn pending(&self) -> impl Iterator<Item = &str> {
        match self {
            MacroEntry::Text {
                pending: Some(names),
                ..
            } => Some(names.iter().map(String::as_str)),
            _ => None,
        }
        .into_iter()
        .flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum MacroError {
    #[display("macro `{_0}` references itself")]
    SelfReference(#[error(not(source))] String),

    #[display("macros form a cycle: {}", _0.join(" -> "))]
    Cycle(#[error(not(source))] Vec<String>),
}

/// Declared and generated macros, in declaration order.
#[derive(Debug, Clone)]
pub struct MacroTable {
    entries: IndexMap<String, Vec1<MacroEntry>>,
}

impl Default for MacroTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroTable {
    /// A table holding only the generated macros.
    pub fn new() -> Self {
        let entries = Generator::ALL
            .into_iter()
            .map(|g| (g.name().to_string(), Vec1::new(MacroEntry::Generated(g))))
            .collect();

        Self { entries }
    }

    /// Appends values to `name`. Generated names cannot be redeclared; such
    /// declarations are dropped.
    pub fn declare<S: Into<String>>(
        &mut self,
        name: &str,
        values: impl IntoIterator<Item = S>,
        dereference: bool,
    ) {
        if Generator::from_name(name).is_some() {
            debug!(name, "ignoring redeclaration of a generated macro");
            return;
        }

        for value in values {
            let entry = MacroEntry::text(value, dereference);
            match self.entries.get_mut(name) {
                Some(existing) => existing.push(entry),
                None => {
                    self.entries.insert(name.to_string(), Vec1::new(entry));
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&[MacroEntry]> {
        self.entries.get(name).map(|entries| &**entries)
    }

    /// Substitutes macro references inside every value marked for
    /// dereferencing, dependencies first.
    pub fn resolve(&self) -> Result<ResolvedTable, MacroError> {
        let mut resolution = Resolution {
            table: self,
            marks: HashMap::new(),
            path: Vec::new(),
            resolved: ResolvedTable::default(),
        };

        for name in self.entries.keys() {
            resolution.visit(name)?;
        }

        Ok(resolution.resolved)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

struct Resolution<'t> {
    table: &'t MacroTable,
    marks: HashMap<&'t str, Mark>,
    /// Names currently being visited, outermost first.
    path: Vec<&'t str>,
    resolved: ResolvedTable,
}

impl<'t> Resolution<'t> {
    fn visit(&mut self, name: &'t str) -> Result<(), MacroError> {
        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = self.path.iter().position(|n| *n == name).unwrap_or(0);
                let cycle = self.path[start..].iter().map(|n| n.to_string()).collect();
                return Err(MacroError::Cycle(cycle));
            }
            None => {}
        }

        let table = self.table;
        let Some((name, entries)) = table.entries.get_key_value(name) else {
            return Ok(());
        };

        let dependencies: IndexSet<&'t str> = entries
            .iter()
            .flat_map(MacroEntry::pending)
            .filter(|dep| table.entries.contains_key(*dep))
            .collect();

        if dependencies.contains(name.as_str()) {
            return Err(MacroError::SelfReference(name.clone()));
        }

        self.marks.insert(name, Mark::Visiting);
        self.path.push(name);
        for dependency in dependencies.iter().copied() {
            self.visit(dependency)?;
        }
        self.path.pop();

        let values = entries
            .iter()
            .flat_map(|entry| match entry {
                MacroEntry::Text {
                    value,
                    pending: Some(_),
                } => self
                    .resolved
                    .dereference(value)
                    .into_iter()
                    .map(MacroValue::from)
                    .collect::<Vec<_>>(),
                MacroEntry::Text { value, pending: None } => vec![MacroValue::Text(value.clone())],
                MacroEntry::Generated(g) => vec![MacroValue::Generated(*g)],
            })
            .collect::<Vec<_>>();

        if !dependencies.is_empty() {
            debug!(name = name.as_str(), ?dependencies, "resolved macro");
        }

        self.resolved.values.insert(name.clone(), values);
        self.marks.insert(name, Mark::Done);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum MacroValue {
    Text(String),
    Generated(Generator),
}

impl MacroValue {
    /// The text of this value; generated values are produced afresh.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            MacroValue::Text(text) => Cow::Borrowed(text),
            MacroValue::Generated(g) => Cow::Owned(g.generate()),
        }
    }
}

/// Macros with all inter-macro references substituted.
#[derive(Debug, Clone, Default)]
pub struct ResolvedTable {
    values: IndexMap<String, Vec<MacroValue>>,
}

impl ResolvedTable {
    pub fn get(&self, name: &str) -> Option<&[MacroValue]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// Expands every bound macro reference in `input`. A multi-valued macro
    /// multiplies the output: the result is the cartesian product of all the
    /// references' values, in order. Unbound references are left as written.
    pub fn dereference(&self, input: &str) -> Vec<String> {
        let segments = segments(input);
        if !segments.iter().any(|s| matches!(s, Segment::Reference { .. })) {
            return vec![input.to_string()];
        }

        let choices = segments
            .into_iter()
            .map(|segment| match segment {
                Segment::Text(text) => vec![Cow::Borrowed(text)],
                Segment::Reference { name, raw } => match self.values.get(name) {
                    Some(values) => values.iter().map(MacroValue::render).collect(),
                    None => {
                        trace!(name, "unbound macro reference left in place");
                        vec![Cow::Borrowed(raw)]
                    }
                },
            })
            .collect::<Vec<_>>();

        choices
            .into_iter()
            .multi_cartesian_product()
            .map(|parts| parts.concat())
            .collect()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Reference { name: &'a str, raw: &'a str },
}

fn segments(input: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;
    while let Some(offset) = input[pos..].find('$') {
        let at = pos + offset;
        match reference_at(&input[at..]) {
            Some((name, len)) => {
                if text_start < at {
                    segments.push(Segment::Text(&input[text_start..at]));
                }
                segments.push(Segment::Reference {
                    name,
                    raw: &input[at..at + len],
                });
                pos = at + len;
                text_start = pos;
            }
            None => pos = at + 1,
        }
    }

    if text_start < input.len() {
        segments.push(Segment::Text(&input[text_start..]));
    }

    segments
}

/// Parses `${name}` or `$name` at the start of `s`, returning the name and
/// the length of the whole reference.
fn reference_at(s: &str) -> Option<(&str, usize)> {
    let rest = s.strip_prefix('$')?;
    if let Some(braced) = rest.strip_prefix('{') {
        let end = braced.find('}')?;
        let name = &braced[..end];
        rxml_validation::validate_ncname(name).ok()?;
        Some((name, end + 3))
    } else {
        let len = ncname_prefix_len(rest);
        (len > 0).then(|| (&rest[..len], len + 1))
    }
}

/// Byte length of the longest NCName at the start of `s`.
fn ncname_prefix_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if is_name_start_char(c) => {}
        _ => return 0,
    }

    chars
        .find(|(_, c)| !is_name_char(*c))
        .map_or(s.len(), |(i, _)| i)
}

fn is_name_start_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | 'a'..='z' | '_'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}'
            | '\u{300}'..='\u{36F}'
            | '\u{203F}'..='\u{2040}')
}

/// Macro references in `input`, as `(name, raw text)`.
pub fn references(input: &str) -> impl Iterator<Item = (&str, &str)> {
    segments(input).into_iter().filter_map(|segment| match segment {
        Segment::Reference { name, raw } => Some((name, raw)),
        Segment::Text(_) => None,
    })
}

pub fn has_references(input: &str) -> bool {
    references(input).next().is_some()
}
