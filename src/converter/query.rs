//! WHERE clause traversal
//!
//! Triples and unions are read first so that every table and projection is
//! known when the filters are resolved. Filters are only attached to their
//! tables once the whole clause has been read.

use super::{ConversionContext, ConversionError, ConversionResult, FiltersBySubject};
use crate::sparql::namespace::LABEL_SERVICE;
use crate::sparql::{GraphPattern, Query, Term, Triple};
use crate::thingtalk::BooleanExpression;
use tracing::debug;

const SERVICE_PARAM: &str = "http://www.bigdata.com/rdf#serviceParam";

fn flatten_groups<'p>(patterns: &'p [GraphPattern], out: &mut Vec<&'p GraphPattern>) {
    for pattern in patterns {
        match pattern {
            GraphPattern::Group(inner) => flatten_groups(inner, out),
            other => out.push(other),
        }
    }
}

/// `SERVICE wikibase:label { bd:serviceParam wikibase:language "en" }`
fn is_label_service(name: &Term, patterns: &[GraphPattern]) -> bool {
    name.as_iri() == Some(LABEL_SERVICE)
        && patterns.iter().all(|p| match p {
            GraphPattern::Bgp(triples) => triples
                .iter()
                .all(|t| t.subject.as_iri() == Some(SERVICE_PARAM)),
            _ => false,
        })
}

impl ConversionContext<'_> {
    /// Read the WHERE clause, statements and grouping of a query into tables
    pub async fn parse_query(&mut self, query: &Query) -> ConversionResult<()> {
        if query.wildcard {
            return Err(ConversionError::UnsupportedClause("SELECT *".to_string()));
        }
        self.parse_where(&query.where_clause).await?;
        self.convert_predicates().await?;
        self.parse_group(query)
    }

    async fn parse_where(&mut self, where_clause: &[GraphPattern]) -> ConversionResult<()> {
        let mut patterns = Vec::new();
        flatten_groups(where_clause, &mut patterns);

        let mut filters = FiltersBySubject::new();
        for pattern in &patterns {
            match pattern {
                GraphPattern::Filter(_) => {}
                GraphPattern::Bgp(triples) => filters.merge(self.parse_triples(triples).await?),
                GraphPattern::Union(branches) => filters.merge(self.parse_union(branches).await?),
                GraphPattern::Service { name, patterns, .. } if is_label_service(name, patterns) => {
                    debug!("Skipping label service");
                }
                other => return Err(ConversionError::UnsupportedClause(other.kind().to_string())),
            }
        }
        for pattern in &patterns {
            if let GraphPattern::Filter(expression) = pattern {
                filters.merge(self.parse_filter(expression, false).await?);
            }
        }

        for (subject, subject_filters) in filters {
            for filter in subject_filters {
                self.add_filter(&subject, filter);
            }
        }
        Ok(())
    }

    /// Each branch must constrain the same single subject; the branches
    /// become a disjunction on it
    async fn parse_union(&mut self, branches: &[Vec<GraphPattern>]) -> ConversionResult<FiltersBySubject> {
        let mut subject: Option<String> = None;
        let mut operands = Vec::new();
        for branch in branches {
            let mut patterns = Vec::new();
            flatten_groups(branch, &mut patterns);
            let mut triples: Vec<Triple> = Vec::new();
            for pattern in patterns {
                match pattern {
                    GraphPattern::Bgp(branch_triples) => triples.extend(branch_triples.iter().cloned()),
                    other => {
                        return Err(ConversionError::UnsupportedClause(format!(
                            "{} inside a union",
                            other.kind()
                        )))
                    }
                }
            }

            let mut parsed = self.parse_triples(&triples).await?.into_iter();
            let (branch_subject, filters) = match (parsed.next(), parsed.next()) {
                (Some(only), None) => only,
                (None, _) => {
                    return Err(ConversionError::UnsupportedClause(
                        "union branch without a filter".to_string(),
                    ))
                }
                (Some(_), Some(_)) => return Err(ConversionError::MultipleSubjectsInUnion),
            };
            match &subject {
                Some(previous) if *previous != branch_subject => {
                    return Err(ConversionError::MultipleSubjectsInUnion)
                }
                Some(_) => {}
                None => subject = Some(branch_subject),
            }
            operands.push(BooleanExpression::and(filters));
        }

        Ok(match subject {
            Some(subject) => FiltersBySubject::single(subject, BooleanExpression::or(operands)),
            None => FiltersBySubject::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::test_support::{kb, schema};
    use crate::converter::ConverterOptions;
    use crate::sparql::parse_query;

    #[tokio::test]
    async fn test_union_on_one_subject() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = ConversionContext::new(&schema, &kb, &options, "writers or actors");
        let query = parse_query(
            "SELECT ?x WHERE { ?x wdt:P31 wd:Q5 . { ?x wdt:P106 wd:Q36180 . } UNION { ?x wdt:P106 wd:Q33999 . } }",
        )
        .unwrap();
        context.parse_query(&query).await.unwrap();
        let table = context.tables().get("x").unwrap();
        assert_eq!(table.name, "human");
        assert_eq!(
            table.filters[0].to_string(),
            "contains ( occupation , \" Q36180 \" ^^wd:p_occupation ( \" writers \" ) ) || contains ( occupation , \" Q33999 \" ^^wd:p_occupation ( \" actors \" ) )"
        );
    }

    #[tokio::test]
    async fn test_union_on_different_subjects() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = ConversionContext::new(&schema, &kb, &options, "writers or actors");
        let query = parse_query(
            "SELECT ?x WHERE { { ?x wdt:P106 wd:Q36180 . } UNION { ?y wdt:P106 wd:Q33999 . } }",
        )
        .unwrap();
        assert!(matches!(
            context.parse_query(&query).await,
            Err(ConversionError::MultipleSubjectsInUnion)
        ));
    }

    #[tokio::test]
    async fn test_label_service_is_ignored_and_optional_is_not() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let mut context = ConversionContext::new(&schema, &kb, &options, "");
        let query = parse_query(
            "SELECT ?x WHERE { ?x wdt:P31 wd:Q5 . SERVICE wikibase:label { bd:serviceParam wikibase:language \"en\" . } }",
        )
        .unwrap();
        context.parse_query(&query).await.unwrap();
        assert_eq!(context.tables().get("x").unwrap().name, "human");

        let query = parse_query("SELECT ?x WHERE { ?x wdt:P31 wd:Q5 . OPTIONAL { ?x wdt:P569 ?d . } }").unwrap();
        assert!(matches!(
            context.parse_query(&query).await,
            Err(ConversionError::UnsupportedClause(kind)) if kind == "optional"
        ));
    }
}
