//! Triple patterns
//!
//! A triple either narrows its subject's table (`?x wdt:P31 wd:Q5`), adds a
//! filter (`?x wdt:P106 wd:Q36180`), or binds its object variable as a
//! projection (`?x wdt:P569 ?date`). Reified statements are handed to the
//! predicate stage.

use super::{ConversionContext, ConversionError, ConversionResult, FiltersBySubject, Projection};
use crate::schema::{ValueType, GENERIC_DOMAIN};
use crate::sparql::namespace::{is_direct_property, is_entity, is_reified_property, local_id, RDFS_LABEL};
use crate::sparql::{PropertyPath as SparqlPath, Term, Triple, Verb};
use crate::thingtalk::{
    BooleanExpression, Operator, PathQuantifier, ProjectionTarget, PropertyPathElement, Value,
};
use oxrdf::vocab::xsd;
use oxrdf::Literal;
use tracing::debug;

/// Domain assumed for entities the knowledge base has no class for
const FALLBACK_DOMAIN: &str = "Q35120";

const INSTANCE_OF: &str = "P31";

/// Registry key of a subject: variable name or entity IRI
pub(crate) fn subject_key(subject: &Term) -> ConversionResult<String> {
    match subject {
        Term::Variable(v) => Ok(v.as_str().to_string()),
        Term::Iri(iri) => Ok(iri.as_str().to_string()),
        other => Err(ConversionError::UnsupportedTriple(format!("subject {}", other))),
    }
}

/// Untyped or language-tagged literal
fn is_plain_string(literal: &Literal) -> bool {
    literal.language().is_some() || literal.datatype() == xsd::STRING
}

impl ConversionContext<'_> {
    pub async fn parse_triples(&mut self, triples: &[Triple]) -> ConversionResult<FiltersBySubject> {
        let mut filters = FiltersBySubject::new();
        for triple in triples {
            debug!("Triple: {}", triple);
            filters.merge(self.parse_triple(triple).await?);
        }
        Ok(filters)
    }

    async fn parse_triple(&mut self, triple: &Triple) -> ConversionResult<FiltersBySubject> {
        let (subject, object) = (&triple.subject, &triple.object);
        match &triple.predicate {
            Verb::Term(Term::Iri(predicate)) => self.parse_basic_triple(subject, predicate.as_str(), object).await,
            Verb::Path(SparqlPath::Iri(predicate)) => {
                self.parse_basic_triple(subject, predicate.as_str(), object).await
            }
            Verb::Path(SparqlPath::Alternative(alternatives)) => {
                self.parse_alternative_path(subject, alternatives, object).await
            }
            Verb::Path(path) => self.parse_sequence_path(subject, path, object).await,
            Verb::Term(_) => Err(ConversionError::UnsupportedTriple(triple.to_string())),
        }
    }

    /// `id == <entity>` for an entity subject seen for the first time
    async fn entity_subject_filter(&mut self, subject: &Term) -> ConversionResult<Option<BooleanExpression>> {
        let Term::Iri(iri) = subject else {
            return Ok(None);
        };
        let iri = iri.as_str();
        if !is_entity(iri) || self.tables.contains(iri) {
            return Ok(None);
        }

        let qid = local_id(iri);
        let domain = self
            .kb
            .get_domain(qid)
            .await?
            .unwrap_or_else(|| FALLBACK_DOMAIN.to_string());
        let table = self.schema.get_table(&domain).unwrap_or(GENERIC_DOMAIN);
        let entity_type = ValueType::Entity(self.schema.entity_type(table));
        let value = self.convert_value(iri, &entity_type).await?;
        self.set_domain(iri, &domain);
        Ok(Some(BooleanExpression::atom("id", Operator::Equal, value)))
    }

    async fn parse_basic_triple(
        &mut self,
        subject: &Term,
        predicate: &str,
        object: &Term,
    ) -> ConversionResult<FiltersBySubject> {
        let key = subject_key(subject)?;
        let mut filters = FiltersBySubject::new();
        if let Some(id) = self.entity_subject_filter(subject).await? {
            filters.add(&key, id);
        }

        if is_reified_property(predicate) {
            self.parse_predicate(subject, predicate, object)?;
            return Ok(filters);
        }

        match (subject, object) {
            (Term::Variable(_), Term::Iri(_) | Term::Literal(_)) => {
                if is_direct_property(predicate) && local_id(predicate) == INSTANCE_OF && object.as_iri().is_some() {
                    self.set_domain(&key, local_id(object.value()));
                } else if predicate == RDFS_LABEL {
                    let label = Value::String(object.value().to_string());
                    filters.add(&key, BooleanExpression::atom("id", Operator::Like, label));
                } else {
                    let value_type = object
                        .as_literal()
                        .filter(|l| is_plain_string(l))
                        .map(|_| ValueType::String);
                    let atom = self.make_atom(predicate, object.value(), None, value_type.as_ref()).await?;
                    filters.add(&key, atom);
                }
            }
            (_, Term::Variable(variable)) => {
                if predicate == RDFS_LABEL {
                    self.project_label(&key, variable.as_str())?;
                } else if is_direct_property(predicate) {
                    let property = self.property_name(predicate)?;
                    self.add_projection(&key, Projection::property(property, variable.as_str()));
                } else {
                    return Err(ConversionError::UnknownProperty(predicate.to_string()));
                }
            }
            (Term::Iri(_), Term::Iri(_)) => {
                let atom = self.make_atom(predicate, object.value(), None, None).await?;
                filters.add(&key, atom);
            }
            _ => {
                return Err(ConversionError::UnsupportedTriple(format!(
                    "{} <{}> {}",
                    subject, predicate, object
                )))
            }
        }
        Ok(filters)
    }

    /// `?y rdfs:label ?name` where `?y` is projected by some table `T`:
    /// project `<property>Label` from `T`
    fn project_label(&mut self, subject: &str, variable: &str) -> ConversionResult<()> {
        let Some((owner, projection)) = self.tables.find_projection(subject) else {
            debug!("Label of ?{} is not projected by any table", subject);
            return Ok(());
        };
        let property = projection
            .property
            .as_property()
            .ok_or_else(|| ConversionError::PropertyPathNotSupported(format!("label of ?{}", subject)))?;
        let owner = owner.to_string();
        let label = Projection::property(format!("{}Label", property), variable);
        self.add_projection(&owner, label);
        Ok(())
    }

    async fn parse_sequence_path(
        &mut self,
        subject: &Term,
        path: &SparqlPath,
        object: &Term,
    ) -> ConversionResult<FiltersBySubject> {
        let key = subject_key(subject)?;
        let mut filters = FiltersBySubject::new();
        if let Some(id) = self.entity_subject_filter(subject).await? {
            filters.add(&key, id);
        }

        let elements = self.path_elements(path)?;
        let last = elements
            .last()
            .map(|e| e.property.clone())
            .ok_or_else(|| ConversionError::PropertyPathNotSupported(path.to_string()))?;
        let last_type = self
            .schema
            .get_property_type(&last)
            .cloned()
            .ok_or(ConversionError::UnknownProperty(last))?;

        match object {
            Term::Variable(variable) => {
                self.add_projection(&key, Projection::new(ProjectionTarget::Path(elements), variable.as_str()));
            }
            Term::Iri(_) | Term::Literal(_) => {
                let operator = if last_type.is_array() {
                    Operator::Contains
                } else {
                    Operator::Equal
                };
                let value = self.convert_value(object.value(), last_type.elem_type()).await?;
                filters.add(
                    &key,
                    BooleanExpression::PropertyPath {
                        path: elements,
                        operator,
                        value,
                    },
                );
            }
            other => return Err(ConversionError::UnsupportedTriple(format!("object {}", other))),
        }
        Ok(filters)
    }

    fn path_elements(&self, path: &SparqlPath) -> ConversionResult<Vec<PropertyPathElement>> {
        let items = match path {
            SparqlPath::Sequence(items) => items.as_slice(),
            other => std::slice::from_ref(other),
        };
        items.iter().map(|item| self.path_element(item)).collect()
    }

    fn path_element(&self, item: &SparqlPath) -> ConversionResult<PropertyPathElement> {
        let unsupported = || ConversionError::PropertyPathNotSupported(item.to_string());
        let (iri, quantifier) = match item {
            SparqlPath::Iri(iri) => (iri.as_str(), None),
            SparqlPath::OneOrMore(inner) => (inner.as_iri().ok_or_else(unsupported)?, Some(PathQuantifier::OneOrMore)),
            SparqlPath::ZeroOrMore(inner) => {
                (inner.as_iri().ok_or_else(unsupported)?, Some(PathQuantifier::ZeroOrMore))
            }
            _ => return Err(unsupported()),
        };
        if !is_direct_property(iri) {
            return Err(ConversionError::UnknownProperty(iri.to_string()));
        }
        Ok(PropertyPathElement::with_quantifier(self.property_name(iri)?, quantifier))
    }

    /// `?x wdt:P1|wdt:P2 v`: one disjunct per alternative
    async fn parse_alternative_path(
        &mut self,
        subject: &Term,
        alternatives: &[SparqlPath],
        object: &Term,
    ) -> ConversionResult<FiltersBySubject> {
        let key = subject_key(subject)?;
        let mut filters = FiltersBySubject::new();
        if let Some(id) = self.entity_subject_filter(subject).await? {
            filters.add(&key, id);
        }

        let mut branches = Vec::new();
        for alternative in alternatives {
            let predicate = alternative
                .as_iri()
                .ok_or_else(|| ConversionError::PropertyPathNotSupported(alternative.to_string()))?;
            for (branch_subject, branch_filters) in self.parse_basic_triple(subject, predicate, object).await? {
                if branch_subject == key {
                    branches.push(BooleanExpression::and(branch_filters));
                } else {
                    filters.extend(branch_subject, branch_filters);
                }
            }
        }
        if !branches.is_empty() {
            filters.add(&key, BooleanExpression::or(branches));
        }
        Ok(filters)
    }

    /// Atom on a property given as a direct-property IRI or a property name
    ///
    /// Without an explicit operator, collections use `contains` and scalars
    /// `==`; a string value type turns the comparison into a substring match.
    /// The value is converted to `value_type`, or to the element type of the
    /// property.
    pub(crate) async fn make_atom(
        &self,
        property: &str,
        value: &str,
        operator: Option<Operator>,
        value_type: Option<&ValueType>,
    ) -> ConversionResult<BooleanExpression> {
        let name = if is_direct_property(property) {
            self.property_name(property)?
        } else {
            property.to_string()
        };
        let property_type = self
            .schema
            .get_property_type(&name)
            .cloned()
            .ok_or_else(|| ConversionError::UnknownProperty(name.clone()))?;
        self.make_typed_atom(&name, &property_type, value, operator, value_type).await
    }

    /// [`make_atom`](Self::make_atom) with the property type supplied
    pub(crate) async fn make_typed_atom(
        &self,
        name: &str,
        property_type: &ValueType,
        value: &str,
        operator: Option<Operator>,
        value_type: Option<&ValueType>,
    ) -> ConversionResult<BooleanExpression> {
        let is_array = property_type.is_array();
        let operator = match (operator, value_type) {
            (_, Some(ValueType::String)) if is_array => Operator::ContainsLike,
            (_, Some(ValueType::String)) => Operator::Like,
            (None | Some(Operator::Equal), _) if is_array => Operator::Contains,
            (None, _) => Operator::Equal,
            (Some(op), _) => op,
        };
        let value_type = value_type.unwrap_or(property_type.elem_type());
        let value = self.convert_value(value, value_type).await?;
        Ok(BooleanExpression::atom(name, operator, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::test_support::{kb, schema};
    use crate::converter::ConverterOptions;
    use crate::sparql::{parse_query, GraphPattern};

    fn triples(sparql: &str) -> Vec<Triple> {
        let query = parse_query(sparql).unwrap();
        match query.where_clause.into_iter().next() {
            Some(GraphPattern::Bgp(triples)) => triples,
            other => panic!("expected a basic graph pattern, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_instance_of_narrows_the_table() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = ConversionContext::new(&schema, &kb, &options, "");
        let filters = context
            .parse_triples(&triples("SELECT ?x WHERE { ?x wdt:P31 wd:Q5 . ?x wdt:P569 ?d . }"))
            .await
            .unwrap();
        assert!(filters.is_empty());
        let table = context.tables().get("x").unwrap();
        assert_eq!(table.name, "human");
        assert_eq!(table.projections, vec![Projection::property("date_of_birth", "d")]);
    }

    #[tokio::test]
    async fn test_entity_subject_gets_id_filter_once() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = ConversionContext::new(&schema, &kb, &options, "douglas adams");
        let filters = context
            .parse_triples(&triples(
                "SELECT ?x ?y WHERE { wd:Q42 wdt:P569 ?x . wd:Q42 wdt:P19 ?y . }",
            ))
            .await
            .unwrap();
        let subject = "http://www.wikidata.org/entity/Q42";
        assert_eq!(filters.get(subject).unwrap().len(), 1);
        assert!(filters.get(subject).unwrap()[0].is_id_filter());
        assert_eq!(context.tables().get(subject).unwrap().projections.len(), 2);
    }

    #[tokio::test]
    async fn test_label_triples() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = ConversionContext::new(&schema, &kb, &options, "");
        let filters = context
            .parse_triples(&triples(
                r#"SELECT ?x WHERE { ?x rdfs:label "Obama"@en . ?x wdt:P19 ?p . ?p rdfs:label ?name . }"#,
            ))
            .await
            .unwrap();
        assert_eq!(
            filters.get("x").unwrap(),
            &[BooleanExpression::atom("id", Operator::Like, Value::String("Obama".into()))]
        );
        let projections = &context.tables().get("x").unwrap().projections;
        assert_eq!(projections[1], Projection::property("place_of_birthLabel", "name"));
    }

    #[tokio::test]
    async fn test_paths() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = ConversionContext::new(&schema, &kb, &options, "in new york city");
        let filters = context
            .parse_triples(&triples(
                "SELECT ?x WHERE { ?x wdt:P19/wdt:P131+ wd:Q60 . ?x wdt:P19/wdt:P17 ?c . }",
            ))
            .await
            .unwrap();
        assert_eq!(
            filters.get("x").unwrap()[0].to_string(),
            "contains ( < place_of_birth / located_in_the_administrative_territorial_entity + > , \" Q60 \" ^^wd:p_located_in_the_administrative_territorial_entity ( \" new york city \" ) )"
        );
        let projection = &context.tables().get("x").unwrap().projections[0];
        assert!(matches!(&projection.property, ProjectionTarget::Path(p) if p.len() == 2));
    }

    #[tokio::test]
    async fn test_alternative_path_is_a_disjunction() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = ConversionContext::new(&schema, &kb, &options, "writers or actors");
        let filters = context
            .parse_triples(&triples(
                "SELECT ?x WHERE { ?x wdt:P106|wdt:P166 wd:Q36180 . }",
            ))
            .await
            .unwrap();
        assert!(matches!(&filters.get("x").unwrap()[0], BooleanExpression::Or(ops) if ops.len() == 2));
    }

    #[tokio::test]
    async fn test_unknown_property() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = ConversionContext::new(&schema, &kb, &options, "");
        let err = context
            .parse_triples(&triples("SELECT ?x WHERE { ?x wdt:P9999 ?y . }"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::UnknownProperty(_)));
    }
}
