//! The key grammar.
//!
//! A form key is either a macro declaration (`$ name`, optionally followed by
//! `$` to mark its values for dereferencing) or a statement template:
//!
//! ```text
//! [modifier] term1 [term2] [designator] [$]
//! [modifier] term1 designator graph [$]
//! [modifier] term1 term2 [designator] graph [$]
//! ```
//!
//! Anything else is ignored.

use crate::macros;

/// What a statement does with its values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Action {
    #[default]
    Insert,
    Delete,
    /// Delete every existing object, then insert.
    Overwrite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// The value fills the subject position instead of the object position.
    pub reverse: bool,
    pub action: Action,
}

impl Modifiers {
    fn parse(token: &str) -> Option<Self> {
        let (reverse, action) = match token {
            "+" => (false, Action::Insert),
            "-" => (false, Action::Delete),
            "=" => (false, Action::Overwrite),
            "!" | "+!" | "!+" => (true, Action::Insert),
            "-!" | "!-" => (true, Action::Delete),
            _ => return None,
        };

        Some(Self { reverse, action })
    }
}

/// Selects how a value is turned into a term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Designator {
    /// `:` makes an IRI, or a blank node if written as `_:label`.
    Resource,
    /// `_` always makes a blank node.
    BlankNode,
    /// `'` makes a plain literal.
    Literal,
    /// `@lang` makes a language-tagged literal.
    Language(String),
    /// `^term` makes a typed literal. The datatype is itself a term.
    Datatype(String),
}

impl Designator {
    fn parse(token: &str) -> Option<Self> {
        match token {
            ":" => Some(Self::Resource),
            "_" => Some(Self::BlankNode),
            "'" => Some(Self::Literal),
            _ => {
                if let Some(tag) = token.strip_prefix('@') {
                    is_language_tag(tag).then(|| Self::Language(tag.to_string()))
                } else if let Some(datatype) = token.strip_prefix('^') {
                    is_term(datatype).then(|| Self::Datatype(datatype.to_string()))
                } else {
                    None
                }
            }
        }
    }

    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource | Self::BlankNode)
    }
}

/// A macro declaration key: `$ name` or `$ name $`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    /// The declared values may themselves reference macros.
    pub dereference: bool,
}

impl Declaration {
    pub fn parse(key: &str) -> Option<Self> {
        match key.split_whitespace().collect::<Vec<_>>().as_slice() {
            ["$", name] => Self::new(name, false),
            ["$", name, "$"] => Self::new(name, true),
            _ => None,
        }
    }

    fn new(name: &str, dereference: bool) -> Option<Self> {
        rxml_validation::validate_ncname(name).ok()?;
        Some(Self {
            name: name.to_string(),
            dereference,
        })
    }
}

/// A decomposed statement key. Terms are kept as raw tokens; they are
/// resolved against the session when the statement is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementTemplate {
    pub modifiers: Modifiers,
    pub term1: String,
    pub term2: Option<String>,
    pub designator: Option<Designator>,
    pub graph: Option<String>,
    /// Values must be macro-dereferenced before use.
    pub dereference: bool,
}

enum Field<'a> {
    Term(&'a str),
    Designator(Designator),
}

impl<'a> Field<'a> {
    fn parse(token: &'a str) -> Option<Self> {
        if is_term(token) {
            Some(Self::Term(token))
        } else {
            Designator::parse(token).map(Self::Designator)
        }
    }
}

impl StatementTemplate {
    pub fn parse(key: &str) -> Option<Self> {
        let mut tokens = key.split_whitespace().collect::<Vec<_>>();

        let dereference = tokens.last() == Some(&"$");
        if dereference {
            tokens.pop();
        }

        let mut modifiers = Modifiers::default();
        let mut rest = tokens.as_slice();
        if let Some((first, tail)) = rest.split_first() {
            if let Some(parsed) = Modifiers::parse(first) {
                modifiers = parsed;
                rest = tail;
            }
        }

        let fields = rest
            .iter()
            .map(|token| Field::parse(token))
            .collect::<Option<Vec<_>>>()?;

        let template = |term1: &str, term2: Option<&str>, designator, graph: Option<&str>| Self {
            modifiers,
            term1: term1.to_string(),
            term2: term2.map(str::to_string),
            designator,
            graph: graph.map(str::to_string),
            dereference,
        };

        use Field::{Designator as D, Term as T};
        let template = match fields.as_slice() {
            // predicate [designator]; subject comes from the session
            [T(p)] => template(*p, None, None, None),
            [T(p), D(d)] => template(*p, None, Some(d.clone()), None),
            // subject predicate [designator]
            [T(s), T(p)] => template(*s, Some(*p), None, None),
            [T(s), T(p), D(d)] => template(*s, Some(*p), Some(d.clone()), None),
            // predicate designator graph
            [T(p), D(d), T(g)] => template(*p, None, Some(d.clone()), Some(*g)),
            // subject predicate [designator] graph
            [T(s), T(p), T(g)] => template(*s, Some(*p), None, Some(*g)),
            [T(s), T(p), D(d), T(g)] => template(*s, Some(*p), Some(d.clone()), Some(*g)),
            _ => return None,
        };

        Some(template)
    }

    /// The explicit designator, or the default: a resource for reversed
    /// statements and a plain literal otherwise.
    pub fn designator(&self) -> Designator {
        match &self.designator {
            Some(designator) => designator.clone(),
            None if self.modifiers.reverse => Designator::Resource,
            None => Designator::Literal,
        }
    }
}

/// How a form key is treated by the processor.
#[derive(Debug, PartialEq, Eq)]
pub enum Key<'a> {
    Declaration(Declaration),
    /// A statement template, possibly only once macros in the key have been
    /// expanded.
    Candidate(&'a str),
    Unrecognized,
}

pub fn classify(key: &str) -> Key<'_> {
    if let Some(declaration) = Declaration::parse(key) {
        Key::Declaration(declaration)
    } else if macros::has_references(key) || StatementTemplate::parse(key).is_some() {
        Key::Candidate(key)
    } else {
        Key::Unrecognized
    }
}

/// `prefix:anything`, where the prefix is an NCName or a URI scheme.
fn is_term(token: &str) -> bool {
    match token.split_once(':') {
        Some((prefix, _)) => {
            rxml_validation::validate_ncname(prefix).is_ok() || is_scheme(prefix)
        }
        None => false,
    }
}

fn is_scheme(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn is_language_tag(tag: &str) -> bool {
    let mut subtags = tag.split('-');
    subtags
        .next()
        .is_some_and(|primary| !primary.is_empty() && primary.chars().all(|c| c.is_ascii_alphabetic()))
        && subtags.all(|sub| !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn parse(key: &str) -> StatementTemplate {
        StatementTemplate::parse(key).unwrap()
    }

    #[rstest]
    #[case("$ lol", "lol", false)]
    #[case("  $   lol  ", "lol", false)]
    #[case("$ lol $", "lol", true)]
    #[case("$ SUBJECT", "SUBJECT", false)]
    fn declarations(#[case] key: &str, #[case] name: &str, #[case] dereference: bool) {
        assert_eq!(
            classify(key),
            Key::Declaration(Declaration {
                name: name.to_string(),
                dereference,
            })
        );
    }

    #[rstest]
    #[case("$lol")]
    #[case("$ 1lol")]
    #[case("$ lol $ $")]
    #[case("$ a:b")]
    fn not_declarations(#[case] key: &str) {
        assert!(Declaration::parse(key).is_none());
    }

    #[test]
    fn predicate_only() {
        let t = parse("dct:title");
        assert_eq!(t.term1, "dct:title");
        assert_eq!(t.term2, None);
        assert_eq!(t.graph, None);
        assert_eq!(t.designator(), Designator::Literal);
        assert!(!t.dereference);
    }

    #[test]
    fn subject_and_predicate() {
        let t = parse("ex:s ex:p :");
        assert_eq!(t.term1, "ex:s");
        assert_eq!(t.term2.as_deref(), Some("ex:p"));
        assert_eq!(t.designator, Some(Designator::Resource));
        assert_eq!(t.graph, None);
    }

    #[test]
    fn predicate_designator_graph() {
        let t = parse("ex:p @en ex:g");
        assert_eq!(t.term1, "ex:p");
        assert_eq!(t.term2, None);
        assert_eq!(t.designator, Some(Designator::Language("en".into())));
        assert_eq!(t.graph.as_deref(), Some("ex:g"));
    }

    #[rstest]
    #[case("ex:s ex:p ex:g", None)]
    #[case("ex:s ex:p _ ex:g", Some(Designator::BlankNode))]
    fn subject_predicate_graph(#[case] key: &str, #[case] designator: Option<Designator>) {
        let t = parse(key);
        assert_eq!(t.term1, "ex:s");
        assert_eq!(t.term2.as_deref(), Some("ex:p"));
        assert_eq!(t.designator, designator);
        assert_eq!(t.graph.as_deref(), Some("ex:g"));
    }

    #[rstest]
    #[case(":", Designator::Resource)]
    #[case("_", Designator::BlankNode)]
    #[case("'", Designator::Literal)]
    #[case("@en-GB", Designator::Language("en-GB".into()))]
    #[case("^xsd:integer", Designator::Datatype("xsd:integer".into()))]
    #[case("^http://example.com/dt", Designator::Datatype("http://example.com/dt".into()))]
    fn designators(#[case] token: &str, #[case] expected: Designator) {
        let t = parse(&format!("dct:title {token}"));
        assert_eq!(t.designator(), expected);
    }

    #[rstest]
    #[case("dct:title", false, Action::Insert)]
    #[case("+ dct:title", false, Action::Insert)]
    #[case("- dct:title", false, Action::Delete)]
    #[case("= dct:title", false, Action::Overwrite)]
    #[case("! dct:hasPart", true, Action::Insert)]
    #[case("+! dct:hasPart", true, Action::Insert)]
    #[case("!+ dct:hasPart", true, Action::Insert)]
    #[case("-! dct:hasPart", true, Action::Delete)]
    #[case("!- dct:hasPart", true, Action::Delete)]
    fn modifiers(#[case] key: &str, #[case] reverse: bool, #[case] action: Action) {
        assert_eq!(parse(key).modifiers, Modifiers { reverse, action });
    }

    #[test]
    fn reverse_defaults_to_resource() {
        assert_eq!(parse("! dct:hasPart").designator(), Designator::Resource);
        assert_eq!(
            parse("! dct:hasPart '").designator(),
            Designator::Literal,
            "explicit designators are kept even when they make the statement invalid"
        );
    }

    #[test]
    fn trailing_dollar_marks_value() {
        let t = parse("dct:title $");
        assert!(t.dereference);
        assert_eq!(t.term1, "dct:title");

        let t = parse("- ex:s ex:p : ex:g $");
        assert!(t.dereference);
        assert_eq!(t.graph.as_deref(), Some("ex:g"));
    }

    #[rstest]
    #[case("")]
    #[case("title")]
    #[case("dct:title : :")]
    #[case("=! dct:title")]
    #[case("dct:title @")]
    #[case("dct:title ^notaterm")]
    #[case("a:b c:d e:f g:h i:j")]
    #[case("submit")]
    fn unrecognized(#[case] key: &str) {
        assert_eq!(classify(key), Key::Unrecognized);
    }

    #[test]
    fn keys_with_macros_are_candidates() {
        assert_eq!(classify("$subject dct:title"), Key::Candidate("$subject dct:title"));
        assert_eq!(classify("${p} :"), Key::Candidate("${p} :"));
    }

    #[test]
    fn absolute_iris_are_terms() {
        let t = parse("http://purl.org/dc/terms/title");
        assert_eq!(t.term1, "http://purl.org/dc/terms/title");
    }
}
