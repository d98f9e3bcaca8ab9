use std::{io::Read, path::PathBuf, process::ExitCode};

use clap::Parser;
use oxrdf::{BlankNode, NamedNode, NamedOrBlankNode};
use rdf_kv::{FormData, RdfKv};
use tracing_subscriber::EnvFilter;

/// Reads an `application/x-www-form-urlencoded` body and prints the edits
/// it describes, deletes first.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// The resource that unqualified statements are about (an IRI, or `_:label`).
    #[arg(long, value_parser = parse_resource)]
    subject: NamedOrBlankNode,

    /// The graph that statements go into when they do not name one.
    #[arg(long, value_parser = parse_resource)]
    graph: Option<NamedOrBlankNode>,

    /// An extra prefix, as `name=namespace`.
    #[arg(long = "prefix", value_name = "NAME=NAMESPACE", value_parser = parse_prefix)]
    prefixes: Vec<(String, String)>,

    /// The form body; standard input if absent.
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,
}

fn parse_resource(s: &str) -> Result<NamedOrBlankNode, String> {
    match s.strip_prefix("_:") {
        Some(label) => BlankNode::new(label)
            .map(Into::into)
            .map_err(|err| err.to_string()),
        None => NamedNode::new(s)
            .map(Into::into)
            .map_err(|err| err.to_string()),
    }
}

fn parse_prefix(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, namespace)) => Ok((name.to_string(), namespace.to_string())),
        None => Err(format!("expected NAME=NAMESPACE, got `{s}`")),
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rdf_kv=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let body = match &args.input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut body = String::new();
            std::io::stdin().lock().read_to_string(&mut body)?;
            body
        }
    };

    let form = url::form_urlencoded::parse(body.trim_end().as_bytes())
        .into_owned()
        .collect::<FormData>();
    tracing::debug!(fields = form.len(), "decoded form");

    let mut builder = RdfKv::builder(args.subject);
    if let Some(graph) = args.graph {
        builder = builder.graph(graph);
    }
    for (name, namespace) in args.prefixes {
        builder = builder.prefix(name, namespace);
    }

    let mut kv = builder.build()?;
    match kv.process(&form) {
        Ok(edits) => {
            print!("{edits}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("Error: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}
