//! Turns HTML form submissions into RDF edits.
//!
//! Each form key describes a statement about a subject; each of its values
//! becomes an object. Keys may also declare macros (`$ name`), which can be
//! substituted into other keys and values as `$name` or `${name}`.
//!
//! ```
//! use oxrdf::NamedNode;
//! use rdf_kv::{FormData, RdfKv};
//!
//! let mut kv = RdfKv::builder(NamedNode::new("https://example.com/doc")?)
//!     .prefix("dct", "http://purl.org/dc/terms/")
//!     .build()?;
//!
//! let form: FormData = [("= dct:title", "Hello"), ("- dct:creator :", "")]
//!     .into_iter()
//!     .collect();
//!
//! let edits = kv.process(&form)?;
//! assert_eq!(
//!     edits.to_string(),
//!     "D <https://example.com/doc> <http://purl.org/dc/terms/title> * .\n\
//!      D <https://example.com/doc> <http://purl.org/dc/terms/creator> * .\n\
//!      A <https://example.com/doc> <http://purl.org/dc/terms/title> \"Hello\" .\n"
//! );
//! # Ok::<_, Box<dyn std::error::Error>>(())
//! ```
//!
//! A processor keeps the session changes made by `$ SUBJECT`, `$ GRAPH` and
//! `$ PREFIX` across calls, so one instance should serve one request (or
//! one sequence of related requests). Those changes are made before any
//! statement is evaluated and are not undone if the call later fails.

use std::borrow::Cow;

use curie::PrefixMapping;
use indexmap::IndexMap;
use indexmap::map::Entry;
use itertools::Itertools;
use oxrdf::{GraphName, NamedOrBlankNode, Term};
use tracing::{debug, trace, warn};
use vec1::Vec1;

pub mod edit;
pub mod grammar;
pub mod macros;
mod session;
pub mod term;

pub use edit::{Edit, EditSet, Operation};
pub use grammar::{Action, Designator, Key, Modifiers, StatementTemplate};
pub use macros::{Generator, MacroError, MacroTable, ResolvedTable};
pub use session::{Session, SpecialMacro};
pub use term::{Rewrite, TermResolver};

use macros::MacroValue;

#[derive(derive_more::Error, derive_more::Display, derive_more::From, Debug)]
pub enum Error {
    #[display("configuration error: {_0}")]
    #[from(ignore)]
    Configuration(#[error(not(source))] String),

    #[display("macro error: {_0}")]
    Macro(MacroError),

    #[display("could not apply ${name}: {reason}")]
    #[from(ignore)]
    SpecialMacro { name: &'static str, reason: String },

    #[display("datatype `{token}` does not resolve to an IRI")]
    #[from(ignore)]
    Datatype { token: String },
}

/// Form fields in submission order. A key that is submitted more than once
/// keeps all of its values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: IndexMap<String, Vec1<String>>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        match self.fields.entry(key.into()) {
            Entry::Occupied(mut entry) => entry.get_mut().push(value),
            Entry::Vacant(entry) => {
                entry.insert(Vec1::new(value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.fields.get(key).map(|values| &**values)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(key, values)| (key.as_str(), &**values))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for FormData {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.append(key, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = FormData::new();
        form.extend(iter);
        form
    }
}

pub struct Builder {
    subject: Term,
    graph: Option<Term>,
    prefixes: Vec<(String, String)>,
    rewrite: Option<Box<Rewrite>>,
}

impl Builder {
    /// The graph statements go into when they do not name one.
    pub fn graph(mut self, graph: impl Into<Term>) -> Self {
        self.graph = Some(graph.into());
        self
    }

    /// Adds a prefix, or replaces one of the defaults (`rdf`, `rdfs`, `owl`,
    /// `xsd`).
    pub fn prefix(mut self, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.prefixes.push((name.into(), namespace.into()));
        self
    }

    /// Passes every term made from a form value through `rewrite`.
    pub fn rewrite(mut self, rewrite: impl Fn(Term) -> Term + Send + Sync + 'static) -> Self {
        self.rewrite = Some(Box::new(rewrite));
        self
    }

    pub fn build(self) -> Result<RdfKv, Error> {
        let subject = term::as_resource(self.subject).map_err(|term| {
            Error::Configuration(format!(
                "the subject must be an IRI or a blank node, not {term}"
            ))
        })?;

        let graph = self
            .graph
            .map(|graph| {
                term::as_resource(graph).map_err(|term| {
                    Error::Configuration(format!(
                        "the graph must be an IRI or a blank node, not {term}"
                    ))
                })
            })
            .transpose()?;

        let prefixes = term::default_prefixes()
            .and_then(|defaults| {
                self.prefixes
                    .iter()
                    .try_fold(defaults, |mut prefixes, (name, namespace)| {
                        term::register_prefix(&mut prefixes, name, namespace)?;
                        Ok(prefixes)
                    })
            })
            .map_err(|err| Error::Configuration(err.to_string()))?;

        Ok(RdfKv {
            session: Session {
                subject,
                graph,
                prefixes,
            },
            rewrite: self.rewrite,
        })
    }
}

/// A form processor bound to a subject.
pub struct RdfKv {
    session: Session,
    rewrite: Option<Box<Rewrite>>,
}

impl RdfKv {
    pub fn new(subject: impl Into<Term>) -> Result<Self, Error> {
        Self::builder(subject).build()
    }

    pub fn builder(subject: impl Into<Term>) -> Builder {
        Builder {
            subject: subject.into(),
            graph: None,
            prefixes: Vec::new(),
            rewrite: None,
        }
    }

    pub fn subject(&self) -> &NamedOrBlankNode {
        &self.session.subject
    }

    pub fn graph(&self) -> Option<&NamedOrBlankNode> {
        self.session.graph.as_ref()
    }

    pub fn prefixes(&self) -> &PrefixMapping {
        &self.session.prefixes
    }

    /// The namespace currently bound to `prefix`.
    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.session
            .prefixes
            .mappings()
            .find(|(name, _)| name.as_str() == prefix)
            .map(|(_, namespace)| namespace.as_str())
    }

    /// Converts one form submission into edits.
    ///
    /// Macro declarations are resolved first; `$ SUBJECT`, `$ GRAPH` and
    /// `$ PREFIX` then update the session, so every statement in the same
    /// submission sees the new values. Keys that are not statements, and
    /// statements whose terms cannot be resolved, are skipped.
    pub fn process(&mut self, form: &FormData) -> Result<EditSet, Error> {
        let mut table = MacroTable::new();
        let mut candidates = Vec::new();
        for (key, values) in form.iter() {
            match grammar::classify(key) {
                Key::Declaration(declaration) => {
                    trace!(key, name = %declaration.name, "macro declaration");
                    table.declare(
                        &declaration.name,
                        values.iter().map(String::as_str),
                        declaration.dereference,
                    );
                }
                Key::Candidate(key) => candidates.push((key, values)),
                Key::Unrecognized => trace!(key, "ignoring key"),
            }
        }

        let macros = table.resolve()?;

        for special in SpecialMacro::ALL {
            if let Some(values) = macros.get(special.name()) {
                let values = values.iter().map(MacroValue::render).collect::<Vec<_>>();
                self.session.apply(special, &values)?;
            }
        }

        let context = Context {
            session: &self.session,
            terms: self.session.terms().with_rewrite(self.rewrite.as_deref()),
            macros: &macros,
        };

        let mut edits = EditSet::default();
        for (key, values) in candidates {
            for expanded in macros.dereference(key) {
                match StatementTemplate::parse(&expanded) {
                    Some(template) => context.apply(&template, values, &mut edits)?,
                    None => trace!(key = %expanded, "not a statement"),
                }
            }
        }

        debug!(
            inserts = edits.inserts.len(),
            deletes = edits.deletes.len(),
            "processed form"
        );
        Ok(edits)
    }
}

/// Everything one statement needs, fixed for the rest of a `process` call.
struct Context<'a> {
    session: &'a Session,
    terms: TermResolver<'a>,
    macros: &'a ResolvedTable,
}

fn graph_name(node: NamedOrBlankNode) -> GraphName {
    match node {
        NamedOrBlankNode::NamedNode(n) => n.into(),
        NamedOrBlankNode::BlankNode(b) => b.into(),
    }
}

impl Context<'_> {
    fn resolve(&self, token: &str) -> Option<NamedOrBlankNode> {
        match self.terms.resolve_term(token) {
            Ok(node) => Some(node),
            Err(err) => {
                warn!(%err, "skipping statement");
                None
            }
        }
    }

    fn apply(
        &self,
        template: &StatementTemplate,
        values: &[String],
        edits: &mut EditSet,
    ) -> Result<(), Error> {
        let Modifiers { reverse, action } = template.modifiers;
        let designator = template.designator();
        if reverse && !designator.is_resource() {
            debug!(?template, "reverse statement without a resource designator");
            return Ok(());
        }

        let Some(term1) = self.resolve(&template.term1) else {
            return Ok(());
        };

        // The resource each value is related to: the subject of a forward
        // statement, the object of a reverse one. A reverse key reads
        // `predicate [object]`.
        let (anchor, predicate) = match &template.term2 {
            None => (self.session.subject.clone(), term1),
            Some(term2) => {
                let Some(term2) = self.resolve(term2) else {
                    return Ok(());
                };

                if reverse { (term2, term1) } else { (term1, term2) }
            }
        };

        let predicate = match predicate {
            NamedOrBlankNode::NamedNode(predicate) => predicate,
            NamedOrBlankNode::BlankNode(b) => {
                warn!(predicate = %b, "skipping statement with a blank node predicate");
                return Ok(());
            }
        };

        let graph_name = match &template.graph {
            Some(graph) => match self.resolve(graph) {
                Some(graph) => graph_name(graph),
                None => return Ok(()),
            },
            None => self
                .session
                .graph
                .clone()
                .map_or(GraphName::DefaultGraph, graph_name),
        };

        let raw: Cow<'_, [String]> = if template.dereference {
            Cow::Owned(
                values
                    .iter()
                    .flat_map(|value| self.macros.dereference(value))
                    .collect(),
            )
        } else {
            Cow::Borrowed(values)
        };

        let mut values = raw.iter().map(|value| value.trim()).unique().collect::<Vec<_>>();

        if action == Action::Overwrite || (action == Action::Delete && values.contains(&"")) {
            if reverse {
                // the open position would be the subject, which an edit cannot express
                debug!(?template, "no wildcard delete for a reverse statement");
            } else {
                let edit = Edit::wildcard(anchor.clone(), predicate.clone(), graph_name.clone());
                trace!(%edit, "wildcard delete");
                edits.push(Operation::Delete, edit);
            }

            if action == Action::Delete {
                return Ok(());
            }

            values.retain(|value| !value.is_empty());
        }

        let operation = match action {
            Action::Delete => Operation::Delete,
            Action::Insert | Action::Overwrite => Operation::Insert,
        };

        for value in values {
            let Some(term) = self.terms.coerce_term(value, &designator)? else {
                continue;
            };

            let edit = if reverse {
                match term::as_resource(term) {
                    Ok(node) => Edit::new(
                        node,
                        predicate.clone(),
                        anchor.clone(),
                        graph_name.clone(),
                    ),
                    Err(term) => {
                        warn!(%term, "skipping literal in the subject position");
                        continue;
                    }
                }
            } else {
                Edit::new(anchor.clone(), predicate.clone(), term, graph_name.clone())
            };

            trace!(?operation, %edit, "edit");
            edits.push(operation, edit);
        }

        Ok(())
    }
}
