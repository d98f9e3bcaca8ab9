//! The output of processing: quads to delete and quads to insert.

use std::fmt;

use oxrdf::{Dataset, GraphName, NamedNode, NamedOrBlankNode, Quad, QuadRef, SubjectRef, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Delete,
}

impl Operation {
    fn code(self) -> char {
        match self {
            Operation::Insert => 'A',
            Operation::Delete => 'D',
        }
    }
}

/// A quad, except that the object may be left open (`None`) to match any
/// object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edit {
    pub subject: NamedOrBlankNode,
    pub predicate: NamedNode,
    pub object: Option<Term>,
    pub graph_name: GraphName,
}

impl Edit {
    pub fn new(
        subject: impl Into<NamedOrBlankNode>,
        predicate: impl Into<NamedNode>,
        object: impl Into<Term>,
        graph_name: impl Into<GraphName>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: Some(object.into()),
            graph_name: graph_name.into(),
        }
    }

    /// An edit matching every object of `subject` and `predicate`.
    pub fn wildcard(
        subject: impl Into<NamedOrBlankNode>,
        predicate: impl Into<NamedNode>,
        graph_name: impl Into<GraphName>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: None,
            graph_name: graph_name.into(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.object.is_none()
    }

    /// The quad this edit describes, unless it is a wildcard.
    pub fn as_quad(&self) -> Option<QuadRef<'_>> {
        let object = self.object.as_ref()?;
        Some(QuadRef::new(
            &self.subject,
            &self.predicate,
            object,
            &self.graph_name,
        ))
    }

    pub fn matches(&self, quad: QuadRef<'_>) -> bool {
        quad.subject == SubjectRef::from(&self.subject)
            && quad.predicate == self.predicate.as_ref()
            && quad.graph_name == self.graph_name.as_ref()
            && self
                .object
                .as_ref()
                .is_none_or(|object| quad.object == object.as_ref())
    }
}

impl fmt::Display for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.subject, self.predicate)?;
        match &self.object {
            Some(object) => write!(f, "{object}")?,
            None => f.write_str("*")?,
        }

        match &self.graph_name {
            GraphName::NamedNode(n) => write!(f, " {n}")?,
            GraphName::BlankNode(b) => write!(f, " {b}")?,
            GraphName::DefaultGraph => {}
        }

        f.write_str(" .")
    }
}

/// Edits produced by one call to [`crate::RdfKv::process`]. Nothing is
/// deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditSet {
    pub inserts: Vec<Edit>,
    pub deletes: Vec<Edit>,
}

impl EditSet {
    pub fn push(&mut self, operation: Operation, edit: Edit) {
        match operation {
            Operation::Insert => self.inserts.push(edit),
            Operation::Delete => self.deletes.push(edit),
        }
    }

    pub fn len(&self) -> usize {
        self.inserts.len() + self.deletes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }

    /// All edits, deletes first.
    pub fn iter(&self) -> impl Iterator<Item = (Operation, &Edit)> {
        let deletes = self.deletes.iter().map(|e| (Operation::Delete, e));
        let inserts = self.inserts.iter().map(|e| (Operation::Insert, e));
        deletes.chain(inserts)
    }

    /// Applies the deletes, then the inserts, to `dataset`. Wildcard deletes
    /// remove every matching quad present at that point.
    ///
    /// Returns the number of quads removed or added.
    pub fn apply_to(&self, dataset: &mut Dataset) -> usize {
        let mut changed = 0;
        for edit in &self.deletes {
            match edit.as_quad() {
                Some(quad) => changed += usize::from(dataset.remove(quad)),
                None => {
                    let matching = dataset
                        .iter()
                        .filter(|quad| edit.matches(*quad))
                        .map(QuadRef::into_owned)
                        .collect::<Vec<Quad>>();

                    for quad in &matching {
                        changed += usize::from(dataset.remove(quad));
                    }
                }
            }
        }

        for quad in self.inserts.iter().filter_map(Edit::as_quad) {
            changed += usize::from(dataset.insert(quad));
        }

        changed
    }
}

impl fmt::Display for EditSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (operation, edit) in self.iter() {
            writeln!(f, "{} {edit}", operation.code())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use oxrdf::{BlankNode, Literal, NamedNodeRef};

    use super::*;

    const S: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/s");
    const P: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/p");
    const G: NamedNodeRef<'static> = NamedNodeRef::new_unchecked("http://example.com/g");

    fn literal(s: &str) -> Term {
        Literal::new_simple_literal(s).into()
    }

    #[test]
    fn display() {
        let mut edits = EditSet::default();
        edits.push(
            Operation::Insert,
            Edit::new(S.into_owned(), P.into_owned(), literal("x"), G.into_owned()),
        );
        edits.push(
            Operation::Delete,
            Edit::wildcard(S.into_owned(), P.into_owned(), GraphName::DefaultGraph),
        );

        insta::assert_snapshot!(edits.to_string(), @r#"
        D <http://example.com/s> <http://example.com/p> * .
        A <http://example.com/s> <http://example.com/p> "x" <http://example.com/g> .
        "#);
    }

    #[test]
    fn wildcard_matches_any_object() {
        let edit = Edit::wildcard(S.into_owned(), P.into_owned(), GraphName::DefaultGraph);
        let quad = Quad::new(S.into_owned(), P.into_owned(), literal("x"), GraphName::DefaultGraph);
        assert!(edit.matches(quad.as_ref()));

        let other_graph = Quad::new(S.into_owned(), P.into_owned(), literal("x"), G.into_owned());
        assert!(!edit.matches(other_graph.as_ref()));
    }

    #[test]
    fn apply_to_dataset() {
        let mut dataset = Dataset::new();
        for value in ["a", "b"] {
            dataset.insert(&Quad::new(
                S.into_owned(),
                P.into_owned(),
                literal(value),
                GraphName::DefaultGraph,
            ));
        }
        let unrelated = Quad::new(
            BlankNode::default(),
            P.into_owned(),
            literal("a"),
            GraphName::DefaultGraph,
        );
        dataset.insert(&unrelated);

        let mut edits = EditSet::default();
        edits.push(
            Operation::Delete,
            Edit::wildcard(S.into_owned(), P.into_owned(), GraphName::DefaultGraph),
        );
        edits.push(
            Operation::Insert,
            Edit::new(S.into_owned(), P.into_owned(), literal("c"), GraphName::DefaultGraph),
        );

        assert_eq!(edits.apply_to(&mut dataset), 3);
        assert_eq!(dataset.len(), 2);
        assert!(dataset.contains(&unrelated));
        assert!(dataset.contains(&Quad::new(
            S.into_owned(),
            P.into_owned(),
            literal("c"),
            GraphName::DefaultGraph,
        )));
    }
}
