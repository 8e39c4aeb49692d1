//! Literal and entity values
//!
//! Entity values carry a display string taken from the utterance, so that
//! the output program mentions the entity the way the question did.

use super::{ConversionContext, ConversionError, ConversionResult};
use crate::schema::ValueType;
use crate::sparql::namespace::ENTITY_PREFIX;
use crate::text::{closest, words_to_numbers};
use crate::thingtalk::{DatePiece, Value};
use chrono::{DateTime, Datelike, NaiveDate};
use tracing::debug;

/// Display strings for entities whose label never appears in the questions
/// that mention them
const ENTITY_SPAN_OVERRIDE: [(&str, &str); 6] = [
    ("Q11631", "cosmonauts"),
    ("Q15180", "cosmonauts"),
    ("Q159", "cosmonauts"),
    ("Q5274359", "the first season of the hbo television series the sopranos"),
    ("Q4970706", "federal chancellors of germany"),
    ("Q10800557", "actors"),
];

/// Spelled unit -> (unit, base unit)
const UNITS: [(&str, &str, &str); 12] = [
    ("meters", "m", "m"),
    ("metres", "m", "m"),
    ("meter", "m", "m"),
    ("m", "m", "m"),
    ("kilometers", "km", "m"),
    ("km", "km", "m"),
    ("centimeters", "cm", "m"),
    ("cm", "cm", "m"),
    ("feet", "ft", "m"),
    ("miles", "mi", "m"),
    ("kilograms", "kg", "kg"),
    ("kg", "kg", "kg"),
];

fn override_span(qid: &str) -> Option<&'static str> {
    ENTITY_SPAN_OVERRIDE
        .iter()
        .find(|(id, _)| *id == qid)
        .map(|(_, span)| *span)
}

/// Parse an `xsd:dateTime`, `YYYY-MM-DD` or bare year
pub fn parse_date(value: &str) -> Option<DatePiece> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(DatePiece::ymd(date.year(), date.month(), date.day()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(DatePiece::ymd(date.year(), date.month(), date.day()));
    }
    value.parse::<i32>().ok().map(DatePiece::year)
}

impl ConversionContext<'_> {
    /// Convert a raw value (entity IRI, bare id or literal text) into a value
    /// of the given type
    pub async fn convert_value(&self, value: &str, value_type: &ValueType) -> ConversionResult<Value> {
        let mut value_type = value_type;
        loop {
            value_type = match value_type {
                ValueType::Array(inner) => inner,
                ValueType::Compound(fields) => fields
                    .get("value")
                    .ok_or_else(|| ConversionError::UnsupportedValueType(value_type.to_string()))?,
                _ => break,
            };
        }

        match value_type {
            ValueType::Entity(entity_type) => {
                let qid = value.strip_prefix(ENTITY_PREFIX).unwrap_or(value);
                let display = if self.options.exclude_entity_display {
                    None
                } else {
                    Some(self.entity_display(qid).await?)
                };
                Ok(Value::Entity {
                    value: qid.to_string(),
                    entity_type: entity_type.clone(),
                    display,
                })
            }
            ValueType::Enum(_) => {
                let id = value.strip_prefix(ENTITY_PREFIX).unwrap_or(value);
                let label = self.kb.get_label(id).await?;
                Ok(Value::Enum(label.unwrap_or_else(|| id.to_string())))
            }
            ValueType::Measure(base_unit) => self.convert_measure(value, base_unit),
            ValueType::Number => value
                .trim()
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| ConversionError::InvalidValue(format!("{} is not a number", value))),
            ValueType::String => Ok(Value::String(value.to_string())),
            ValueType::Boolean => match value.trim() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                other => Err(ConversionError::InvalidValue(format!("{} is not a boolean", other))),
            },
            ValueType::Date => parse_date(value)
                .map(Value::Date)
                .ok_or_else(|| ConversionError::InvalidValue(format!("{} is not a date", value))),
            other => Err(ConversionError::UnsupportedValueType(other.to_string())),
        }
    }

    /// Span of the utterance that best matches the entity's label, then its
    /// aliases, then the fixed overrides
    async fn entity_display(&self, qid: &str) -> ConversionResult<String> {
        let label = self.kb.get_label(qid).await?;
        if let Some(label) = &label {
            if let Some(span) = closest(label, &self.keywords) {
                return Ok(span.to_string());
            }
        }
        for alt in self.kb.get_alt_labels(qid).await? {
            if let Some(span) = closest(&alt, &self.keywords) {
                debug!("Matched {} through alias {}", qid, alt);
                return Ok(span.to_string());
            }
        }
        if let Some(span) = override_span(qid) {
            return Ok(span.to_string());
        }
        Err(ConversionError::UnresolvedEntityDisplay {
            qid: qid.to_string(),
            label: label.unwrap_or_default(),
        })
    }

    /// The measure's number comes from the literal; the utterance supplies
    /// the unit, taken from the first `<number> <unit>` pair whose unit has
    /// the same base. A literal that is not numeric falls back to the number
    /// written in the utterance.
    fn convert_measure(&self, value: &str, base_unit: &str) -> ConversionResult<Value> {
        let literal = value.trim().parse::<f64>().ok();
        let utterance = words_to_numbers(&self.utterance);
        let tokens: Vec<&str> = utterance.split(' ').collect();
        for pair in tokens.windows(2) {
            let Ok(number) = pair[0].parse::<f64>() else {
                continue;
            };
            let unit = UNITS
                .iter()
                .find(|(word, _, base)| *word == pair[1] && *base == base_unit);
            if let Some((_, unit, _)) = unit {
                return Ok(Value::Measure {
                    value: literal.unwrap_or(number),
                    unit: unit.to_string(),
                });
            }
        }
        Err(ConversionError::InvalidValue(format!(
            "no measure in {} unit for {} in the utterance",
            base_unit, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::test_support::{kb, schema};
    use crate::converter::ConverterOptions;

    #[tokio::test]
    async fn test_entity_display_from_label_or_alias() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let context = ConversionContext::new(&schema, &kb, &options, "what did obama do in the usa");

        let value = context
            .convert_value("http://www.wikidata.org/entity/Q30", &ValueType::Entity("wd:country".into()))
            .await
            .unwrap();
        assert_eq!(
            value,
            Value::Entity {
                value: "Q30".to_string(),
                entity_type: "wd:country".to_string(),
                display: Some("usa".to_string()),
            }
        );

        let value = context
            .convert_value("Q76", &ValueType::Entity("wd:human".into()))
            .await
            .unwrap();
        assert!(matches!(value, Value::Entity { display: Some(d), .. } if d == "obama"));
    }

    #[tokio::test]
    async fn test_override_span() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let context = ConversionContext::new(&schema, &kb, &options, "list all actors");
        let value = context
            .convert_value("Q10800557", &ValueType::Entity("wd:entity".into()))
            .await
            .unwrap();
        assert!(matches!(value, Value::Entity { display: Some(d), .. } if d == "actors"));
    }

    #[tokio::test]
    async fn test_scalar_values() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let context = ConversionContext::new(&schema, &kb, &options, "who is taller than two meters");

        assert_eq!(
            context.convert_value("1952-03-11T00:00:00Z", &ValueType::Date).await.unwrap(),
            Value::Date(DatePiece::ymd(1952, 3, 11))
        );
        assert_eq!(
            context.convert_value("1990", &ValueType::Date).await.unwrap(),
            Value::Date(DatePiece::year(1990))
        );
        assert_eq!(
            context.convert_value("12.5", &ValueType::Number).await.unwrap(),
            Value::Number(12.5)
        );
        assert_eq!(
            context.convert_value("2", &ValueType::Measure("m".into())).await.unwrap(),
            Value::Measure {
                value: 2.0,
                unit: "m".to_string()
            }
        );
        assert!(matches!(
            context.convert_value("x", &ValueType::Location).await,
            Err(ConversionError::UnsupportedValueType(_))
        ));
        assert!(matches!(
            context.convert_value("soon", &ValueType::Date).await,
            Err(ConversionError::InvalidValue(_))
        ));
    }

    #[tokio::test]
    async fn test_measure_takes_number_from_literal() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let height = ValueType::Measure("m".into());
        let cases = [
            ("who is taller than two hundred meters", "200", 200.0, "m"),
            ("which tower is twenty five meters high", "25", 25.0, "m"),
            ("rivers longer than 3 km", "3", 3.0, "km"),
            ("taller than two hundred meters", "two hundred", 200.0, "m"),
        ];
        for (utterance, literal, expected, unit) in cases {
            let context = ConversionContext::new(&schema, &kb, &options, utterance);
            assert_eq!(
                context.convert_value(literal, &height).await.unwrap(),
                Value::Measure {
                    value: expected,
                    unit: unit.to_string()
                },
                "{}",
                utterance
            );
        }

        let context = ConversionContext::new(&schema, &kb, &options, "who weighs two hundred kilograms");
        assert!(matches!(
            context.convert_value("200", &height).await,
            Err(ConversionError::InvalidValue(_))
        ));
    }

    #[tokio::test]
    async fn test_compound_converts_its_value_field() {
        let (schema, kb, options) = (schema(), kb(), ConverterOptions::default());
        let context = ConversionContext::new(&schema, &kb, &options, "who was president of the united states");
        let ty = schema.get_property_type("position_held").unwrap().element().clone();
        let value = context.convert_value("Q11696", &ty).await.unwrap();
        assert!(matches!(value, Value::Entity { entity_type, .. } if entity_type == "wd:p_position_held"));
    }
}
