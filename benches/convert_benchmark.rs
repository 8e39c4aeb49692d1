use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sparql2thingtalk::config::AbstractProperties;
use sparql2thingtalk::converter::{ConverterOptions, SparqlToThingTalkConverter};
use sparql2thingtalk::kb::InMemoryKnowledgeBase;
use sparql2thingtalk::patterns::PatternConverter;
use sparql2thingtalk::schema::Schema;
use sparql2thingtalk::sparql::{normalize, parse_query};
use std::sync::Arc;

const SCHEMA: &str = r#"
domains:
  - name: human
    subject: Q5
    properties:
      - name: date_of_birth
        id: P569
        type: Date
      - name: occupation
        id: P106
        type: Array(Entity(wd:p_occupation))
      - name: spouse
        id: P26
        type: Array(Entity(wd:human))
  - name: entity
    subject: Q35120
    properties:
      - name: country
        id: P17
        type: Array(Entity(wd:p_country))
"#;

const QUERIES: [(&str, &str, &str); 4] = [
    (
        "property",
        "SELECT DISTINCT ?x WHERE { wd:Q42 wdt:P569 ?x . }",
        "when was douglas adams born",
    ),
    (
        "filter",
        "SELECT DISTINCT ?x WHERE { ?x wdt:P31 wd:Q5 . ?x wdt:P106 wd:Q36180 . }",
        "which humans are writers",
    ),
    (
        "subquery",
        "SELECT ?x WHERE { ?x wdt:P31 wd:Q5 . ?x wdt:P26 ?y . ?y wdt:P106 wd:Q33999 . }",
        "who is married to an actor",
    ),
    (
        "ordering",
        "SELECT ?x WHERE { ?x wdt:P31 wd:Q5 . ?x wdt:P569 ?d . } ORDER BY DESC(?d) LIMIT 1",
        "who is the youngest human",
    ),
];

fn converter() -> SparqlToThingTalkConverter {
    let kb = InMemoryKnowledgeBase::new()
        .with_label("Q5", "human")
        .with_label("Q35120", "entity")
        .with_label("Q42", "Douglas Adams")
        .with_instance_of("Q42", "Q5")
        .with_label("Q36180", "writer")
        .with_label("Q33999", "actor");
    SparqlToThingTalkConverter::new(
        Arc::new(Schema::from_yaml_str(SCHEMA).unwrap()),
        Arc::new(kb),
        Arc::new(AbstractProperties::default()),
        ConverterOptions::default(),
    )
}

/// Parsing alone, without the knowledge base
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparql_parse");
    for (name, sparql, _) in QUERIES.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), sparql, |b, sparql| {
            b.iter(|| criterion::black_box(parse_query(sparql).unwrap()));
        });
    }
    group.finish();
}

/// Full conversion against the in-memory knowledge base
fn bench_convert(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let converter = converter();
    let mut group = c.benchmark_group("convert");
    for (name, sparql, utterance) in QUERIES.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), sparql, |b, sparql| {
            b.iter(|| criterion::black_box(runtime.block_on(converter.convert(sparql, utterance))));
        });
    }
    group.finish();
}

/// Shortcut lookup over the embedded table, hit and miss
fn bench_pattern_lookup(c: &mut Criterion) {
    let patterns = PatternConverter::embedded().unwrap();
    let hit = "SELECT DISTINCT ?x WHERE { SERVICE wikibase:label { bd:serviceParam wikibase:language \"en\". wd:Q42 schema:description ?x. } }";
    let miss = QUERIES[1].1;
    let mut group = c.benchmark_group("pattern_lookup");
    group.bench_function("hit", |b| b.iter(|| criterion::black_box(patterns.from_sparql(hit))));
    group.bench_function("miss", |b| b.iter(|| criterion::black_box(patterns.from_sparql(miss))));
    group.bench_function("normalize", |b| b.iter(|| criterion::black_box(normalize(hit))));
    group.finish();
}

criterion_group!(benches, bench_parse, bench_convert, bench_pattern_lookup);
criterion_main!(benches);
