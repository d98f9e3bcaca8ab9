//! Resolving form tokens into RDF terms.

use curie::{Curie, PrefixMapping};
use oxiri::{Iri, IriParseError};
use oxrdf::{BlankNode, Literal, NamedNode, NamedOrBlankNode, Term};
use tracing::warn;

use crate::Error;
use crate::grammar::Designator;

/// Replaces each coerced value before it is used in an edit.
pub type Rewrite = dyn Fn(Term) -> Term + Send + Sync;

/// Prefixes every processor starts with.
pub const DEFAULT_PREFIXES: [(&str, &str); 4] = [
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

pub fn default_prefixes() -> Result<PrefixMapping, PrefixError> {
    DEFAULT_PREFIXES
        .into_iter()
        .try_fold(PrefixMapping::default(), |mut mapping, (prefix, iri)| {
            register_prefix(&mut mapping, prefix, iri)?;
            Ok(mapping)
        })
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum PrefixError {
    #[display("`{_0}` is not a valid prefix name")]
    InvalidName(#[error(not(source))] String),

    #[display("invalid prefix: the prefix '_' is reserved")]
    Reserved(#[error(not(source))] curie::InvalidPrefixError),

    #[display("namespace `{iri}` is not an absolute IRI")]
    Namespace { source: IriParseError, iri: String },

    #[display("malformed prefix declaration: `{_0}`")]
    Malformed(#[error(not(source))] String),
}

/// Adds (or replaces) a prefix.
pub fn register_prefix(
    mapping: &mut PrefixMapping,
    name: &str,
    namespace: &str,
) -> Result<(), PrefixError> {
    rxml_validation::validate_ncname(name)
        .map_err(|_| PrefixError::InvalidName(name.to_string()))?;
    Iri::parse(namespace).map_err(|source| PrefixError::Namespace {
        source,
        iri: namespace.to_string(),
    })?;
    mapping
        .add_prefix(name, namespace)
        .map_err(PrefixError::Reserved)
}

/// Parses the `name: namespace` pairs of a `$ PREFIX` value. Several pairs
/// may be given, separated by whitespace; the space after the colon is
/// optional.
pub fn parse_prefix_declarations(value: &str) -> Result<Vec<(&str, &str)>, PrefixError> {
    let mut tokens = value.split_whitespace();
    let mut pairs = Vec::new();
    while let Some(token) = tokens.next() {
        let pair = match token.strip_suffix(':') {
            Some(name) => tokens.next().map(|namespace| (name, namespace)),
            None => token
                .split_once(':')
                .filter(|(_, namespace)| !namespace.is_empty()),
        };

        match pair {
            Some(pair) => pairs.push(pair),
            None => return Err(PrefixError::Malformed(value.to_string())),
        }
    }

    if pairs.is_empty() {
        return Err(PrefixError::Malformed(value.to_string()));
    }

    Ok(pairs)
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum TermError {
    #[display("invalid IRI: `{iri}`")]
    Iri { source: IriParseError, iri: String },

    #[display("invalid blank node label: `{label}`")]
    BlankNode {
        source: oxrdf::BlankNodeIdParseError,
        label: String,
    },
}

/// Splits a term into a resource, or gives it back if it is a literal.
pub fn as_resource(term: Term) -> Result<NamedOrBlankNode, Term> {
    match term {
        Term::NamedNode(n) => Ok(n.into()),
        Term::BlankNode(b) => Ok(b.into()),
        other => Err(other),
    }
}

fn blank_node(label: &str) -> Result<BlankNode, TermError> {
    if label.is_empty() {
        return Ok(BlankNode::default());
    }

    BlankNode::new(label).map_err(|source| TermError::BlankNode {
        source,
        label: label.to_string(),
    })
}

/// Resolves tokens against a subject and a set of prefixes.
pub struct TermResolver<'a> {
    /// Relative references resolve against the subject, when it is an IRI.
    base: Option<Iri<&'a str>>,
    prefixes: &'a PrefixMapping,
    rewrite: Option<&'a Rewrite>,
}

impl<'a> TermResolver<'a> {
    pub fn new(subject: &'a NamedOrBlankNode, prefixes: &'a PrefixMapping) -> Self {
        let base = match subject {
            NamedOrBlankNode::NamedNode(n) => Iri::parse(n.as_str()).ok(),
            NamedOrBlankNode::BlankNode(_) => None,
        };

        Self {
            base,
            prefixes,
            rewrite: None,
        }
    }

    pub fn with_rewrite(self, rewrite: Option<&'a Rewrite>) -> Self {
        Self { rewrite, ..self }
    }

    /// Resolves a key token (or a resource value):
    /// - `_:label` is a blank node,
    /// - `prefix:suffix` with a known prefix (and a suffix not starting
    ///   with `/`) expands the prefix,
    /// - anything else is an IRI reference, resolved against the subject.
    pub fn resolve_term(&self, token: &str) -> Result<NamedOrBlankNode, TermError> {
        if let Some(label) = token.strip_prefix("_:") {
            return blank_node(label).map(Into::into);
        }

        if let Some((prefix, suffix)) = token.split_once(':') {
            if !suffix.starts_with('/') {
                if let Ok(iri) = self.prefixes.expand_curie(&Curie::new(Some(prefix), suffix)) {
                    return self.resolve_iri(&iri).map(Into::into);
                }
            }
        }

        self.resolve_iri(token).map(Into::into)
    }

    fn resolve_iri(&self, value: &str) -> Result<NamedNode, TermError> {
        let resolved = match &self.base {
            Some(base) => base.resolve(value).map(Iri::into_inner),
            None => Iri::parse(value.to_string()).map(Iri::into_inner),
        };

        match resolved {
            Ok(iri) => Ok(NamedNode::new_unchecked(iri)),
            Err(source) => Err(TermError::Iri {
                source,
                iri: value.to_string(),
            }),
        }
    }

    /// Turns a form value into a term according to the designator.
    ///
    /// Empty resource values yield `None`, as do values that cannot form a
    /// valid term (those are logged and skipped). A datatype that does not
    /// resolve to an IRI is an error.
    pub fn coerce_term(&self, value: &str, designator: &Designator) -> Result<Option<Term>, Error> {
        let term: Term = match designator {
            Designator::Resource | Designator::BlankNode if value.is_empty() => return Ok(None),
            Designator::Resource => match self.resolve_term(value) {
                Ok(node) => node.into(),
                Err(err) => {
                    warn!(%err, "skipping value");
                    return Ok(None);
                }
            },
            Designator::BlankNode => match blank_node(value.strip_prefix("_:").unwrap_or(value)) {
                Ok(node) => node.into(),
                Err(err) => {
                    warn!(%err, "skipping value");
                    return Ok(None);
                }
            },
            Designator::Literal => Literal::new_simple_literal(value).into(),
            Designator::Language(tag) => match Literal::new_language_tagged_literal(value, tag) {
                Ok(literal) => literal.into(),
                Err(err) => {
                    warn!(%err, %tag, "skipping value with invalid language tag");
                    return Ok(None);
                }
            },
            Designator::Datatype(token) => match self.resolve_term(token) {
                Ok(NamedOrBlankNode::NamedNode(datatype)) => {
                    Literal::new_typed_literal(value, datatype).into()
                }
                _ => {
                    return Err(Error::Datatype {
                        token: token.clone(),
                    });
                }
            },
        };

        Ok(Some(match self.rewrite {
            Some(rewrite) => rewrite(term),
            None => term,
        }))
    }
}
