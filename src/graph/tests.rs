//! Dataset and serialization tests

use super::*;
use serde_json::json;

fn stmt(s: &str, p: &str, o: Term) -> Statement {
    Statement::new(Term::iri(s), Term::iri(p), o)
}

#[test]
fn dataset_has_set_semantics_per_partition() {
    let mut ds = Dataset::new();
    let s = stmt("http://ex.com/a", "http://ex.com/p", Literal::plain("x").into());

    ds.add(&GraphName::Default, s.clone());
    ds.add(&GraphName::Default, s.clone());
    ds.add(&GraphName::named("http://ex.com/g"), s.clone());

    assert_eq!(ds.len(&GraphName::Default), 1);
    assert_eq!(ds.len(&GraphName::named("http://ex.com/g")), 1);
    assert_eq!(ds.total(), 2);
    assert!(ds.contains(&GraphName::Default, &s));
}

#[test]
fn graphs_lists_default_partition_first() {
    let mut ds = Dataset::new();
    let s = stmt("http://ex.com/a", "http://ex.com/p", Term::iri("http://ex.com/b"));
    ds.add(&GraphName::named("http://ex.com/z"), s.clone());
    ds.add(&GraphName::Default, s);

    let graphs = ds.graphs();
    assert_eq!(graphs.len(), 2);
    assert!(graphs[0].is_default());
}

#[test]
fn preserved_flag_is_per_graph() {
    let mut ds = Dataset::new();
    let g = GraphName::named("http://ex.com/current");
    ds.preserve(&g);
    assert!(ds.is_preserved(&g));
    assert!(!ds.is_preserved(&GraphName::Default));
}

#[test]
fn nquads_line_includes_graph_name() {
    let s = stmt("http://ex.com/a", "http://ex.com/p", Term::iri("http://ex.com/b"));
    assert_eq!(
        s.to_nquads(&GraphName::named("http://ex.com/g")),
        "<http://ex.com/a> <http://ex.com/p> <http://ex.com/b> <http://ex.com/g> ."
    );
    assert_eq!(
        s.to_nquads(&GraphName::Default),
        "<http://ex.com/a> <http://ex.com/p> <http://ex.com/b> ."
    );
}

#[test]
fn term_serializes_with_kind_tag() {
    let term = Term::from(Literal::lang("label", "en"));
    let value = serde_json::to_value(&term).unwrap();
    assert_eq!(
        value,
        json!({
            "kind": "literal",
            "value": { "lexical": "label", "datatype": null, "lang": "en" }
        })
    );

    let back: Term = serde_json::from_value(value).unwrap();
    assert_eq!(back, term);
}

#[test]
fn iris_from_record_data_serialize_safely() {
    let s = stmt(
        "http://example.com/x/a b>c",
        "http://example.com/def/v",
        Literal::plain("ok").into(),
    );
    assert_eq!(
        s.to_ntriples(),
        "<http://example.com/x/a%20b%3Ec> <http://example.com/def/v> \"ok\" ."
    );

    let g = GraphName::named("http://example.com/g/{x}");
    assert_eq!(
        s.to_nquads(&g),
        "<http://example.com/x/a%20b%3Ec> <http://example.com/def/v> \"ok\" <http://example.com/g/%7Bx%7D> ."
    );

    assert_eq!(escape_iri("http://example.com/q\"\\"), "http://example.com/q%22%5C");
    assert!(matches!(
        escape_iri("http://example.com/caf\u{e9}#x"),
        std::borrow::Cow::Borrowed(_)
    ));
}
