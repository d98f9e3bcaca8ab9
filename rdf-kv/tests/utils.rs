#![allow(dead_code)]

use oxrdf::{Literal, NamedNode, Term};
use rdf_kv::{FormData, RdfKv};

pub const SUBJECT: &str = "https://my.website/some/page";
pub const DCT: &str = "http://purl.org/dc/terms/";
pub const XHV: &str = "http://www.w3.org/1999/xhtml/vocab#";

pub fn subject() -> NamedNode {
    NamedNode::new_unchecked(SUBJECT)
}

pub fn dct(local: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{DCT}{local}"))
}

pub fn literal(value: &str) -> Term {
    Literal::new_simple_literal(value).into()
}

/// A processor for [`SUBJECT`] that knows the `dct` and `xhv` prefixes.
pub fn processor() -> RdfKv {
    RdfKv::builder(subject())
        .prefix("dct", DCT)
        .prefix("xhv", XHV)
        .build()
        .unwrap()
}

pub fn form<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> FormData {
    fields.into_iter().collect()
}
