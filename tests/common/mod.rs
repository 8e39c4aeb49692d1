//! Shared fixtures for the end-to-end tests: a small schema document and an
//! in-memory knowledge base covering the entities it mentions.

#![allow(dead_code)]

use sparql2thingtalk::config::AbstractProperties;
use sparql2thingtalk::converter::{ConverterOptions, SparqlToThingTalkConverter};
use sparql2thingtalk::kb::{InMemoryKnowledgeBase, KnowledgeBase};
use sparql2thingtalk::postprocess::PostProcessor;
use sparql2thingtalk::schema::Schema;
use std::sync::Arc;

pub const SCHEMA: &str = r#"
device: wd
domains:
  - name: human
    subject: Q5
    properties:
      - name: date_of_birth
        id: P569
        type: Date
      - name: place_of_birth
        id: P19
        type: Entity(wd:p_place_of_birth)
      - name: residence
        id: P551
        type: Array(Entity(wd:p_residence))
      - name: occupation
        id: P106
        type: Array(Entity(wd:p_occupation))
      - name: spouse
        id: P26
        type: Array(Entity(wd:human))
      - name: position_held
        id: P39
        type: "Array(Compound(value: Entity(wd:p_position_held), start_time: Date, end_time: Date, point_in_time: Date))"
  - name: country
    subject: Q6256
    properties:
      - name: population
        id: P1082
        type: Number
      - name: head_of_government
        id: P6
        type: Array(Entity(wd:human))
  - name: entity
    subject: Q35120
    properties:
      - name: country
        id: P17
        type: Array(Entity(wd:p_country))
      - name: location
        id: P276
        type: Array(Entity(wd:p_location))
      - name: start_time
        id: P580
        type: Date
      - name: end_time
        id: P582
        type: Date
      - name: point_in_time
        id: P585
        type: Date
"#;

pub const ABSTRACT_PROPERTIES: &str = r#"
P276:
  type: any
  properties: [P19, P551, P276]
"#;

pub fn schema() -> Schema {
    Schema::from_yaml_str(SCHEMA).unwrap()
}

pub fn kb() -> InMemoryKnowledgeBase {
    InMemoryKnowledgeBase::new()
        .with_label("Q5", "human")
        .with_label("Q6256", "country")
        .with_label("Q35120", "entity")
        .with_label("Q42", "Douglas Adams")
        .with_instance_of("Q42", "Q5")
        .with_label("Q30", "United States of America")
        .with_alt_labels("Q30", ["USA", "America"])
        .with_instance_of("Q30", "Q6256")
        .with_value("Q30", "P1313", "Q11696")
        .with_label("Q11696", "President of the United States")
        .with_label("Q84", "London")
        .with_label("Q36180", "writer")
        .with_label("Q33999", "actor")
        .with_label("P19", "place of birth")
        .with_alt_labels("P19", ["birthplace"])
        .with_label("P551", "residence")
        .with_label("P276", "location")
}

pub fn abstract_properties() -> AbstractProperties {
    AbstractProperties::from_yaml_str(ABSTRACT_PROPERTIES).unwrap()
}

pub fn converter() -> SparqlToThingTalkConverter {
    SparqlToThingTalkConverter::new(
        Arc::new(schema()),
        Arc::new(kb()),
        Arc::new(abstract_properties()),
        ConverterOptions::default(),
    )
}

pub async fn post_processor() -> PostProcessor {
    let kb: Arc<dyn KnowledgeBase> = Arc::new(kb());
    PostProcessor::load(kb.as_ref(), &abstract_properties(), "wd").await.unwrap()
}
