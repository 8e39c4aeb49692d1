//! The full pipeline as the batch driver runs it: shortcut table, rule-based
//! rewrites, conversion, post-processing

mod common;

use common::{converter, kb, post_processor};
use sparql2thingtalk::patterns::{PatternConverter, PatternError};
use sparql2thingtalk::preprocessor::{CodeKind, RuleBasedPreprocessor};
use sparql2thingtalk::sparql::parse_query;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

async fn run(sparql: &str, utterance: &str) -> String {
    let patterns = PatternConverter::embedded().unwrap();
    if let Some(program) = patterns.from_sparql(sparql) {
        return program;
    }
    let preprocessor = RuleBasedPreprocessor::new(Arc::new(kb()));
    let sparql = preprocessor.preprocess(sparql, CodeKind::Sparql).await.unwrap();
    let expression = converter().convert(&sparql, utterance).await.unwrap();
    post_processor().await.post_process(utterance, expression).to_statement()
}

#[tokio::test]
async fn test_concrete_filter_property_is_abstracted() {
    let out = run(
        "SELECT DISTINCT ?x WHERE { ?x wdt:P31 wd:Q5 . ?x wdt:P19 wd:Q84 . }",
        "which people are associated with london",
    )
    .await;
    assert_eq!(
        out,
        "@wd . human ( ) filter location == \" Q84 \" ^^wd:p_location ( \" london \" ) ;"
    );
}

#[tokio::test]
async fn test_named_property_survives_post_processing() {
    let out = run(
        "SELECT DISTINCT ?x WHERE { ?x wdt:P31 wd:Q5 . ?x wdt:P19 wd:Q84 . }",
        "which people have london as birthplace",
    )
    .await;
    assert_eq!(
        out,
        "@wd . human ( ) filter place_of_birth == \" Q84 \" ^^wd:p_place_of_birth ( \" london \" ) ;"
    );
}

#[tokio::test]
async fn test_concrete_projection_is_abstracted() {
    let out = run(
        "SELECT DISTINCT ?x WHERE { wd:Q42 wdt:P551 ?x . }",
        "what places are tied to douglas adams",
    )
    .await;
    assert_eq!(
        out,
        "[ location ] of @wd . human ( ) filter id == \" Q42 \" ^^wd:human ( \" douglas adams \" ) ;"
    );
}

#[tokio::test]
async fn test_shortcut_wins_over_conversion() {
    let out = run(
        "SELECT DISTINCT ?x WHERE { SERVICE wikibase:label { bd:serviceParam wikibase:language \"en\". wd:Q42 schema:description ?x. } }",
        "who is douglas adams",
    )
    .await;
    assert_eq!(out, "@wd . entity ( ) filter id == \" Q42 \" ^^wd:entity ;");
}

#[tokio::test]
async fn test_rewritten_position_query_still_parses() {
    let preprocessor = RuleBasedPreprocessor::new(Arc::new(kb()));
    let rewritten = preprocessor
        .preprocess(
            "SELECT DISTINCT ?x WHERE { ?x p:P39 ?p . ?p ps:P39 wd:Q11696 ; pq:P585 ?t . }",
            CodeKind::Sparql,
        )
        .await
        .unwrap();
    assert!(rewritten.contains("<http://www.wikidata.org/entity/Q30> <http://www.wikidata.org/prop/P6> ?p"));
    assert!(parse_query(&rewritten).is_ok());
}

#[test]
fn test_user_pattern_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("patterns.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "- thingtalk: '[ spouse ] of @wd . human ( ) filter id == \" $0 \" ^^wd:human ;'").unwrap();
    writeln!(file, "  sparql: 'SELECT DISTINCT ?x WHERE {{ <http://www.wikidata.org/entity/$0> wdt:P26 ?x . }}'").unwrap();
    drop(file);

    let patterns = PatternConverter::load(&path).unwrap();
    assert_eq!(patterns.len(), 1);
    assert_eq!(
        patterns.from_sparql("SELECT DISTINCT ?x WHERE { wd:Q42 wdt:P26 ?x . }").as_deref(),
        Some("[ spouse ] of @wd . human ( ) filter id == \" Q42 \" ^^wd:human ;")
    );

    assert!(matches!(
        PatternConverter::load(dir.path().join("missing.yaml")),
        Err(PatternError::Io { .. })
    ));
}
