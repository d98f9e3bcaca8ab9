use std::borrow::Cow;

use curie::PrefixMapping;
use oxrdf::NamedOrBlankNode;
use tracing::debug;

use crate::Error;
use crate::term::{self, TermResolver};

/// The mutable part of a processor: what unqualified statements are about,
/// and how their terms are resolved.
pub struct Session {
    pub(crate) subject: NamedOrBlankNode,
    pub(crate) graph: Option<NamedOrBlankNode>,
    pub(crate) prefixes: PrefixMapping,
}

/// Macros that change the session rather than expanding into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialMacro {
    Subject,
    Graph,
    Prefix,
}

impl SpecialMacro {
    /// In the order they are applied.
    pub const ALL: [SpecialMacro; 3] = [
        SpecialMacro::Subject,
        SpecialMacro::Graph,
        SpecialMacro::Prefix,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpecialMacro::Subject => "SUBJECT",
            SpecialMacro::Graph => "GRAPH",
            SpecialMacro::Prefix => "PREFIX",
        }
    }
}

impl Session {
    pub fn terms(&self) -> TermResolver<'_> {
        TermResolver::new(&self.subject, &self.prefixes)
    }

    /// `SUBJECT` and `GRAPH` take their last value; every `PREFIX` value is
    /// applied in turn.
    pub(crate) fn apply(&mut self, special: SpecialMacro, values: &[Cow<'_, str>]) -> Result<(), Error> {
        let fail = |reason: String| Error::SpecialMacro {
            name: special.name(),
            reason,
        };

        match special {
            SpecialMacro::Subject | SpecialMacro::Graph => {
                let Some(value) = values.last() else {
                    return Ok(());
                };

                let node = self
                    .terms()
                    .resolve_term(value.trim())
                    .map_err(|err| fail(err.to_string()))?;

                debug!(special = special.name(), %node, "session updated");
                if special == SpecialMacro::Subject {
                    self.subject = node;
                } else {
                    self.graph = Some(node);
                }
            }
            SpecialMacro::Prefix => {
                for value in values {
                    let pairs = term::parse_prefix_declarations(value)
                        .map_err(|err| fail(err.to_string()))?;
                    for (name, namespace) in pairs {
                        term::register_prefix(&mut self.prefixes, name, namespace)
                            .map_err(|err| fail(err.to_string()))?;
                        debug!(name, namespace, "prefix declared");
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use oxrdf::NamedNode;

    use super::*;

    fn session() -> Session {
        Session {
            subject: NamedNode::new_unchecked("https://example.com/a/b").into(),
            graph: None,
            prefixes: term::default_prefixes().unwrap(),
        }
    }

    #[test]
    fn subject_takes_last_value() {
        let mut s = session();
        s.apply(SpecialMacro::Subject, &["/first".into(), " c ".into()])
            .unwrap();

        assert_eq!(
            s.subject,
            NamedOrBlankNode::from(NamedNode::new_unchecked("https://example.com/a/c"))
        );
    }

    #[test]
    fn prefix_values_accumulate() {
        let mut s = session();
        s.apply(
            SpecialMacro::Prefix,
            &["ex: http://example.com/# foo:http://foo.example/".into(), "bar: urn:bar:".into()],
        )
        .unwrap();

        let names = s
            .prefixes
            .mappings()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();

        for name in ["ex", "foo", "bar"] {
            assert!(names.contains(&name), "{name} missing from {names:?}");
        }
    }

    #[test]
    fn invalid_graph_is_an_error() {
        let mut s = session();
        let err = s
            .apply(SpecialMacro::Graph, &["not an iri".into()])
            .unwrap_err();

        assert!(matches!(err, Error::SpecialMacro { name: "GRAPH", .. }));
        assert!(s.graph.is_none());
    }
}
