//! Parse schema definition text into a [`Schema`] using PEST.

use crate::schema::{FieldKind, FieldSpec, Processor, Schema, SchemaError, ValueType};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

/// Parse a field catalog. Ids must be unique and within 2..=128; patterns must compile.
pub fn parse_schema(source: &str) -> Result<Schema, SchemaError> {
    let pairs = SchemaParser::parse(Rule::schema, source)
        .map_err(|e| SchemaError::Parse(e.to_string()))?;
    let pair = pairs
        .into_iter()
        .next()
        .ok_or_else(|| SchemaError::Parse("Empty parse".to_string()))?;
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        if inner.as_rule() == Rule::field_def {
            fields.push(build_field(inner)?);
        }
    }
    Schema::from_fields(fields)
}

fn build_field(pair: Pair<Rule>) -> Result<FieldSpec, SchemaError> {
    let mut id = None;
    let mut layout = None;
    let mut value_type = ValueType::String;
    let mut date_format = None;
    let mut processor = Processor::None;
    let mut name = String::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::field_id => id = Some(parse_id(inner.as_str())?),
            Rule::kind_spec => layout = Some(build_kind(inner)?),
            Rule::value_type => (value_type, date_format) = build_value_type(inner)?,
            Rule::processor => processor = build_processor(inner)?,
            Rule::label => name = string_value(inner),
            _ => {}
        }
    }

    let id = id.ok_or_else(|| SchemaError::Parse("field: missing id".to_string()))?;
    let (kind, length) = layout.ok_or_else(|| SchemaError::Parse(format!("DE{}: missing kind", id)))?;
    let mut spec = FieldSpec::new(id, &name, kind, length).with_type(value_type).with_processor(processor);
    spec.date_format = date_format;
    Ok(spec)
}

fn parse_id(s: &str) -> Result<u8, SchemaError> {
    let raw: u32 = s
        .parse()
        .map_err(|_| SchemaError::Parse(format!("field id {} is not a valid number", s)))?;
    u8::try_from(raw).map_err(|_| SchemaError::InvalidId(raw))
}

fn build_kind(pair: Pair<Rule>) -> Result<(FieldKind, usize), SchemaError> {
    let mut kind = None;
    let mut length = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::kind => {
                kind = Some(match inner.as_str() {
                    "fixed" => FieldKind::Fixed,
                    "llvar" => FieldKind::VarLen2,
                    "lllvar" => FieldKind::VarLen3,
                    other => return Err(SchemaError::Parse(format!("unknown field kind {}", other))),
                })
            }
            Rule::number => {
                length = Some(inner.as_str().parse::<usize>().map_err(|_| {
                    SchemaError::Parse(format!("field length {} is not a valid number", inner.as_str()))
                })?)
            }
            _ => {}
        }
    }
    match (kind, length) {
        (Some(k), Some(n)) => Ok((k, n)),
        _ => Err(SchemaError::Parse("kind: expected kind(length)".to_string())),
    }
}

fn build_value_type(pair: Pair<Rule>) -> Result<(ValueType, Option<String>), SchemaError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| SchemaError::Parse("empty value type".to_string()))?;
    Ok(match inner.as_rule() {
        Rule::type_int => (ValueType::Integer, None),
        Rule::type_decimal => (ValueType::Decimal, None),
        Rule::type_datetime => {
            let format = inner.into_inner().next().map(string_value);
            (ValueType::DateTime, format)
        }
        _ => (ValueType::String, None),
    })
}

fn build_processor(pair: Pair<Rule>) -> Result<Processor, SchemaError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| SchemaError::Parse("empty processor".to_string()))?;
    match inner.as_rule() {
        Rule::proc_rollup => Ok(Processor::TagRollup),
        Rule::proc_tlv => Ok(Processor::CompactTlv),
        Rule::proc_pattern => {
            let pattern = inner
                .into_inner()
                .next()
                .map(string_value)
                .ok_or_else(|| SchemaError::Parse("pattern: missing expression".to_string()))?;
            Ok(Processor::PositionalPattern(pattern))
        }
        other => Err(SchemaError::Parse(format!("unknown processor {:?}", other))),
    }
}

/// Contents of the string literal in `pair` (a `label` or `string_lit`), without quotes.
fn string_value(pair: Pair<Rule>) -> String {
    pair.into_inner()
        .flatten()
        .find(|p| p.as_rule() == Rule::string_inner)
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}
