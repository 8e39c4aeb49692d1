//! Expression generation
//!
//! Picks the main table, joins every other table to it as a subquery and
//! decorates the invocation with sorting, slicing, projections and
//! aggregation (SELECT) or a verification filter (ASK).

use super::{
    Aggregation, ConversionContext, ConversionError, ConversionResult, Projection, Selection, Table,
};
use crate::kb;
use crate::schema::GENERIC_DOMAIN;
use crate::sparql::{Expression as SparqlExpression, Query, QueryForm, SelectItem};
use crate::text::clean_name;
use crate::thingtalk::{
    AggregationOp, BooleanExpression, Expression, Operator, ProjectionElement, ProjectionTarget, SortDirection,
    Value,
};
use indexmap::IndexMap;
use tracing::debug;

/// Selected outputs per subject
pub type Selections = IndexMap<String, Vec<Selection>>;

fn flip(operator: Operator) -> Operator {
    match operator {
        Operator::GreaterEqual => Operator::LessEqual,
        Operator::LessEqual => Operator::GreaterEqual,
        other => other,
    }
}

fn string_property<'p>(projection: &'p Projection, variable: &str) -> ConversionResult<&'p str> {
    projection
        .property
        .as_property()
        .ok_or_else(|| ConversionError::PropertyPathNotSupported(format!("?{}", variable)))
}

/// Property a projection reads from the table, if it can be named
fn projected_property(target: &ProjectionTarget) -> Option<&str> {
    match target {
        ProjectionTarget::Property(name) if name.ends_with("Label") => None,
        ProjectionTarget::Property(name) => Some(name),
        ProjectionTarget::Path(path) => path.first().map(|e| e.property.as_str()),
        ProjectionTarget::Value(value) => value.property_name(),
    }
}

fn table_properties(table: &Table) -> Vec<String> {
    let mut properties: Vec<String> = table.filters.iter().flat_map(|f| f.properties()).collect();
    properties.extend(
        table
            .projections
            .iter()
            .filter_map(|p| projected_property(&p.property))
            .map(str::to_string),
    );
    properties
}

/// `LIMIT 1` picks one row; any other limit keeps a slice
fn add_limit(expression: Expression, query: &Query) -> ConversionResult<Expression> {
    let base = Value::Number((query.offset.unwrap_or(0) + 1) as f64);
    match (query.limit, query.offset) {
        (Some(1), _) => Ok(Expression::Index {
            expression: Box::new(expression),
            indices: vec![base],
        }),
        (Some(limit), _) => Ok(Expression::Slice {
            expression: Box::new(expression),
            base,
            limit: Value::Number(limit as f64),
        }),
        (None, Some(_)) => Err(ConversionError::UnsupportedClause("OFFSET without LIMIT".to_string())),
        (None, None) => Ok(expression),
    }
}

impl ConversionContext<'_> {
    /// Build the target expression from the tables read so far
    pub async fn generate(&mut self, query: &Query) -> ConversionResult<Expression> {
        let expression = match query.form {
            QueryForm::Select => self.generate_select(query).await?,
            QueryForm::Ask => self.generate_ask().await?,
        };
        Ok(expression.optimize())
    }

    async fn generate_select(&mut self, query: &Query) -> ConversionResult<Expression> {
        let mut selections = self.parse_variables(query)?;
        self.preprocess_tables(&mut selections).await?;

        let main = self.main_subject(Some(query))?;
        let table = self.tables.get(&main).cloned().ok_or(ConversionError::NoMainSubject)?;
        let mut filters = table.filters.clone();
        for subject in self.tables.subjects() {
            if subject != main {
                filters.push(self.make_subquery(&main, &subject)?);
            }
        }

        let expression = Expression::invocation(self.schema.device(), &table.name).filter(BooleanExpression::and(filters));
        let expression = self.add_ordering(expression, query, &table)?;
        let expression = add_limit(expression, query)?;
        let empty = Vec::new();
        self.add_projections_and_aggregations(expression, &main, selections.get(&main).unwrap_or(&empty))
    }

    async fn generate_ask(&mut self) -> ConversionResult<Expression> {
        self.preprocess_tables(&mut Selections::new()).await?;

        let main = self.main_subject(None)?;
        let table = self.tables.get(&main).cloned().ok_or(ConversionError::NoMainSubject)?;
        let mut id_filter = None;
        let mut operands = Vec::new();
        for filter in table.filters.iter().cloned() {
            if id_filter.is_none() && filter.is_id_filter() {
                id_filter = Some(filter);
            } else {
                operands.push(filter);
            }
        }
        for subject in self.tables.subjects() {
            if subject != main {
                operands.push(self.make_subquery(&main, &subject)?);
            }
        }
        self.add_verification(&table, id_filter, operands)
    }

    /// Outputs each selected variable stands for, grouped by subject
    pub fn parse_variables(&self, query: &Query) -> ConversionResult<Selections> {
        let mut selections = Selections::new();
        for item in &query.variables {
            match item {
                SelectItem::Variable(variable) => self.select_variable(variable.as_str(), &mut selections),
                SelectItem::Expression {
                    expression: SparqlExpression::Aggregate { name, argument, .. },
                    ..
                } => {
                    let operator = AggregationOp::parse(name)
                        .ok_or_else(|| ConversionError::UnsupportedAggregation(name.clone()))?;
                    let variable = argument
                        .as_deref()
                        .and_then(SparqlExpression::as_variable)
                        .ok_or_else(|| ConversionError::UnsupportedAggregation(format!("{}(*)", name)))?;
                    let (subject, aggregated) = if self.tables.contains(variable) {
                        (variable.to_string(), variable.to_string())
                    } else {
                        let (subject, projection) = self
                            .tables
                            .find_projection(variable)
                            .ok_or_else(|| ConversionError::UnresolvedVariable(variable.to_string()))?;
                        (subject.to_string(), string_property(projection, variable)?.to_string())
                    };
                    selections.entry(subject).or_default().push(Selection::Aggregation(Aggregation {
                        operator,
                        variable: aggregated,
                    }));
                }
                SelectItem::Expression { alias, .. } => {
                    return Err(ConversionError::UnsupportedClause(format!("computed ?{}", alias.as_str())))
                }
            }
        }
        if selections.is_empty() {
            return Err(ConversionError::NoVariables);
        }
        Ok(selections)
    }

    fn select_variable(&self, variable: &str, selections: &mut Selections) {
        for (subject, table) in self.tables.iter() {
            if subject == variable {
                selections
                    .entry(subject.to_string())
                    .or_default()
                    .push(Selection::Projection(Projection::property("id", variable)));
            }
            for projection in table.projections.iter().filter(|p| p.binds(variable)) {
                selections
                    .entry(subject.to_string())
                    .or_default()
                    .push(Selection::Projection(projection.clone()));
            }
        }
    }

    /// Settle table names before generation
    ///
    /// Type-only tables collapse into an entity type annotation on the
    /// projection that selects them; tables still named by a class id are
    /// mapped to the schema domain above that class; tables using
    /// properties their domain lacks are widened to the generic domain.
    pub async fn preprocess_tables(&mut self, selections: &mut Selections) -> ConversionResult<()> {
        self.collapse_type_tables(selections).await?;
        self.resolve_class_tables().await?;
        self.widen_tables().await
    }

    async fn collapse_type_tables(&mut self, selections: &mut Selections) -> ConversionResult<()> {
        for subject in self.tables.subjects() {
            let Some(table) = self.tables.get(&subject) else {
                continue;
            };
            if crate::sparql::namespace::is_entity(&subject)
                || table.name == GENERIC_DOMAIN
                || !table.filters.is_empty()
                || !table.projections.is_empty()
            {
                continue;
            }

            let mut domain = table.name.clone();
            if kb::is_entity(&domain) {
                if let Some(label) = self.kb.get_label(&domain).await? {
                    domain = clean_name(&label);
                }
            }
            let entity_type = self.schema.entity_type(&domain);

            let mut collapsed = false;
            for (other, outputs) in selections.iter_mut() {
                if *other == subject {
                    continue;
                }
                for output in outputs.iter_mut() {
                    if let Selection::Projection(projection) = output {
                        if projection.binds(&subject) {
                            projection.entity_type = Some(entity_type.clone());
                            collapsed = true;
                        }
                    }
                }
            }
            if collapsed {
                debug!("Collapsed ?{} into entity type {}", subject, entity_type);
                self.tables.remove_table(&subject);
                selections.shift_remove(&subject);
            }
        }
        Ok(())
    }

    fn domain_candidates(&self) -> Vec<String> {
        self.schema
            .domains()
            .filter(|(name, _)| *name != GENERIC_DOMAIN)
            .map(|(_, subject)| subject.to_string())
            .collect()
    }

    async fn class_display(&self, qid: &str) -> ConversionResult<Option<String>> {
        if self.options.exclude_entity_display {
            return Ok(None);
        }
        Ok(self.kb.get_label(qid).await?)
    }

    async fn resolve_class_tables(&mut self) -> ConversionResult<()> {
        let candidates = self.domain_candidates();
        for subject in self.tables.subjects() {
            let Some(class) = self.tables.get(&subject).map(|t| t.name.clone()) else {
                continue;
            };
            if !kb::is_entity(&class) {
                continue;
            }
            let domain = self.kb.get_top_level_domain(std::slice::from_ref(&class), &candidates).await?;
            let name = domain
                .as_deref()
                .and_then(|d| self.schema.get_table(d))
                .unwrap_or(GENERIC_DOMAIN)
                .to_string();
            let filter = BooleanExpression::atom(
                "instance_of",
                Operator::Equal,
                Value::Entity {
                    value: class.clone(),
                    entity_type: self.schema.entity_type(&format!("{}_subdomain", name)),
                    display: self.class_display(&class).await?,
                },
            );
            debug!("Resolved class {} of ?{} to {}", class, subject, name);
            self.tables.set_name(&subject, name);
            self.tables.prepend_filter(&subject, filter);
        }
        Ok(())
    }

    async fn widen_tables(&mut self) -> ConversionResult<()> {
        for subject in self.tables.subjects() {
            let Some(table) = self.tables.get(&subject) else {
                continue;
            };
            let Some(arguments) = self.schema.domain_arguments(&table.name) else {
                continue;
            };
            if table.name == GENERIC_DOMAIN || table_properties(table).iter().all(|p| arguments.contains(p)) {
                continue;
            }

            let domain = table.name.clone();
            let class = self.schema.domain_subject(&domain).unwrap_or_default().to_string();
            let display = self.class_display(&class).await?;
            debug!("Widening ?{} from {} to {}", subject, domain, GENERIC_DOMAIN);
            self.tables.set_name(&subject, GENERIC_DOMAIN);

            let generic_type = self.schema.entity_type(GENERIC_DOMAIN);
            let subdomain_type = self.schema.entity_type(&format!("{}_subdomain", GENERIC_DOMAIN));
            let Some(filters) = self.tables.filters_mut(&subject) else {
                continue;
            };
            let mut retyped = false;
            for filter in filters.iter_mut() {
                if filter.atom_name() != Some("instance_of") {
                    continue;
                }
                if let BooleanExpression::Atom {
                    value: Value::Entity { entity_type, .. },
                    ..
                } = filter
                {
                    *entity_type = subdomain_type.clone();
                    retyped = true;
                }
            }
            if retyped {
                continue;
            }
            if let Some(BooleanExpression::Atom {
                value: Value::Entity { entity_type, .. },
                ..
            }) = filters.iter_mut().find(|f| f.is_id_filter())
            {
                *entity_type = generic_type;
                continue;
            }
            filters.insert(
                0,
                BooleanExpression::atom(
                    "instance_of",
                    Operator::Equal,
                    Value::Entity {
                        value: class,
                        entity_type: subdomain_type,
                        display,
                    },
                ),
            );
        }
        Ok(())
    }

    /// The table the output is read from
    pub fn main_subject(&self, query: Option<&Query>) -> ConversionResult<String> {
        if self.tables.len() == 1 {
            return self.tables.subjects().into_iter().next().ok_or(ConversionError::NoMainSubject);
        }

        if let Some(query) = query {
            if let [condition] = query.order_by.as_slice() {
                if let Some((subject, _)) = condition
                    .expression
                    .as_variable()
                    .and_then(|v| self.tables.find_projection(v))
                {
                    return Ok(subject.to_string());
                }
            }
            for item in &query.variables {
                if let SelectItem::Variable(variable) = item {
                    if self.tables.contains(variable.as_str()) {
                        return Ok(variable.as_str().to_string());
                    }
                    if let Some((subject, _)) = self.tables.find_projection(variable.as_str()) {
                        return Ok(subject.to_string());
                    }
                }
            }
        }

        let verification = query.is_none();
        let mut candidates: Vec<(&str, &Table)> = self
            .tables
            .iter()
            .filter(|(_, t)| !t.projections.is_empty())
            .filter(|(_, t)| !verification || t.filters.iter().any(|f| f.is_id_filter()))
            .collect();
        candidates.sort_by(|a, b| b.1.complexity().cmp(&a.1.complexity()));
        candidates
            .first()
            .map(|(subject, _)| subject.to_string())
            .ok_or(ConversionError::NoMainSubject)
    }

    /// Filter on the main table that relates it to another table
    pub fn make_subquery(&self, main: &str, subject: &str) -> ConversionResult<BooleanExpression> {
        let (Some(main_table), Some(table)) = (self.tables.get(main), self.tables.get(subject)) else {
            return Err(ConversionError::SubqueryGeneration(subject.to_string()));
        };
        let subquery = Expression::invocation(self.schema.device(), &table.name)
            .filter(BooleanExpression::and(table.filters.clone()));

        for comparison in &self.comparisons {
            let orientations = [
                (&comparison.lhs, &comparison.rhs, comparison.operator),
                (&comparison.rhs, &comparison.lhs, flip(comparison.operator)),
            ];
            for (main_variable, variable, operator) in orientations {
                let (Some(main_projection), Some(projection)) =
                    (main_table.projection_of(main_variable), table.projection_of(variable))
                else {
                    continue;
                };
                let main_property = string_property(main_projection, main_variable)?;
                let property = string_property(projection, variable)?;
                let operator = match operator {
                    Operator::Equal if self.schema.is_array_property(main_property) => Operator::Contains,
                    Operator::Equal if self.schema.is_array_property(property) => Operator::InArray,
                    operator => operator,
                };
                return Ok(BooleanExpression::ComparisonSubquery {
                    lhs: Value::var_ref(main_property),
                    operator,
                    rhs: Box::new(subquery.project(&[property])),
                });
            }
        }

        if let Some(projection) = main_table.projection_of(subject) {
            let property = string_property(projection, subject)?;
            let operator = if self.schema.is_array_property(property) {
                Operator::Contains
            } else {
                Operator::Equal
            };
            return Ok(BooleanExpression::ComparisonSubquery {
                lhs: Value::var_ref(property),
                operator,
                rhs: Box::new(subquery.project(&["id"])),
            });
        }

        if let Some(projection) = table.projection_of(main) {
            let property = string_property(projection, main)?;
            let operator = if self.schema.is_array_property(property) {
                Operator::InArray
            } else {
                Operator::Equal
            };
            return Ok(BooleanExpression::ComparisonSubquery {
                lhs: Value::var_ref("id"),
                operator,
                rhs: Box::new(subquery.project(&[property])),
            });
        }

        Err(ConversionError::SubqueryGeneration(subject.to_string()))
    }

    fn add_ordering(&self, expression: Expression, query: &Query, table: &Table) -> ConversionResult<Expression> {
        let condition = match query.order_by.as_slice() {
            [] => return Ok(expression),
            [condition] => condition,
            _ => return Err(ConversionError::MultipleOrdering),
        };
        let variable = condition
            .expression
            .as_variable()
            .ok_or_else(|| ConversionError::UnsupportedClause("ordering by an expression".to_string()))?;
        let projection = table
            .projection_of(variable)
            .or_else(|| self.tables.find_projection(variable).map(|(_, p)| p))
            .ok_or_else(|| ConversionError::UnresolvedVariable(variable.to_string()))?;
        let property = string_property(projection, variable)?;
        Ok(Expression::Sort {
            expression: Box::new(expression),
            value: Value::var_ref(property),
            direction: if condition.descending {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            },
        })
    }

    fn add_projections_and_aggregations(
        &self,
        expression: Expression,
        main: &str,
        selections: &[Selection],
    ) -> ConversionResult<Expression> {
        let projections: Vec<&Projection> = selections
            .iter()
            .filter_map(|s| match s {
                Selection::Projection(p) => Some(p),
                Selection::Aggregation(_) => None,
            })
            .collect();
        let aggregations: Vec<&Aggregation> = selections
            .iter()
            .filter_map(|s| match s {
                Selection::Aggregation(a) => Some(a),
                Selection::Projection(_) => None,
            })
            .collect();
        if aggregations.len() > 1 {
            return Err(ConversionError::UnsupportedAggregation(
                "more than one aggregation".to_string(),
            ));
        }

        let mut expression = expression;
        let only_id = matches!(
            projections.as_slice(),
            [p] if p.property.as_property() == Some("id")
        );
        if !projections.is_empty() && !only_id {
            let elements = projections
                .iter()
                .map(|p| ProjectionElement {
                    target: p.property.clone(),
                    types: p.entity_type.iter().cloned().collect(),
                })
                .collect();
            expression = Expression::Projection {
                expression: Box::new(expression),
                elements,
            };
        }

        if let Some(aggregation) = aggregations.first() {
            let field = if aggregation.variable == main {
                "*".to_string()
            } else {
                aggregation.variable.clone()
            };
            expression = Expression::Aggregation {
                expression: Box::new(expression),
                field,
                operator: aggregation.operator,
            };
        }
        Ok(expression)
    }

    /// Wrap the main table in a boolean question over its filters and the
    /// existence of every projected value
    fn add_verification(
        &self,
        table: &Table,
        id_filter: Option<BooleanExpression>,
        mut operands: Vec<BooleanExpression>,
    ) -> ConversionResult<Expression> {
        let used: Vec<String> = operands.iter().flat_map(|o| o.properties()).collect();
        for projection in &table.projections {
            if let Some(name) = projection.property.as_property() {
                if name.ends_with("Label") || used.iter().any(|u| u == name) {
                    continue;
                }
            }
            if projection.variable.as_deref().is_some_and(|v| self.tables.contains(v)) {
                continue;
            }
            operands.push(self.not_null_check(&projection.property));
        }

        let base = Expression::invocation(self.schema.device(), &table.name);
        Ok(match id_filter {
            Some(id) => Expression::BooleanQuestion {
                expression: Box::new(base.filter(id)),
                filter: BooleanExpression::and(operands),
            },
            None => Expression::BooleanQuestion {
                expression: Box::new(Expression::Aggregation {
                    expression: Box::new(base.filter(BooleanExpression::and(operands))),
                    field: "*".to_string(),
                    operator: AggregationOp::Count,
                }),
                filter: BooleanExpression::atom("count", Operator::GreaterEqual, Value::Number(1.0)),
            },
        })
    }
}
