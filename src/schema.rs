//! Field schema: the catalog mapping a data element id (2..=128) to its wire layout.
//!
//! A [`Schema`] is plain configuration data passed to [`crate::Codec`]. The built-in
//! card-network catalog is available through [`Schema::card_network`] and, shared and
//! immutable, through [`default_schema`]. Schemas can also be written as text, see
//! [`crate::parser::parse_schema`].

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

pub const MIN_FIELD_ID: u8 = 2;
pub const MAX_FIELD_ID: u8 = 128;

/// Date format used for datetime fields that do not configure one.
pub const DEFAULT_DATE_FORMAT: &str = "%y%m%d";

/// Layout of card acceptor name/location (DE43): name, street and suburb separated by
/// backslashes, then a fixed-width postcode(10) / state(3) / country(3) tail.
pub const ACCEPTOR_LOCATION_PATTERN: &str = r"(?P<NAME>.+?) *\\(?P<ADDRESS>.+?) *\\(?P<SUBURB>.+?) *\\(?P<POSTCODE>.{10})(?P<STATE>.{3})(?P<COUNTRY>\S{3})$";

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("field id {0} outside 2..=128")]
    InvalidId(u32),
    #[error("duplicate definition for DE{0}")]
    Duplicate(u8),
    #[error("DE{field}: invalid pattern: {source}")]
    Pattern {
        field: u8,
        #[source]
        source: regex::Error,
    },
}

/// How the length of a field is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Exactly `length` bytes.
    Fixed,
    /// LLVAR: 2 ASCII digit length prefix.
    VarLen2,
    /// LLLVAR: 3 ASCII digit length prefix.
    VarLen3,
}

impl FieldKind {
    /// Number of length-prefix digits.
    pub fn prefix_len(&self) -> usize {
        match self {
            FieldKind::Fixed => 0,
            FieldKind::VarLen2 => 2,
            FieldKind::VarLen3 => 3,
        }
    }

    /// Largest body the prefix can describe.
    pub fn max_len(&self) -> Option<usize> {
        match self {
            FieldKind::Fixed => None,
            FieldKind::VarLen2 => Some(99),
            FieldKind::VarLen3 => Some(999),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueType {
    #[default]
    String,
    Integer,
    Decimal,
    DateTime,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::String => "string",
            ValueType::Integer => "int",
            ValueType::Decimal => "decimal",
            ValueType::DateTime => "datetime",
        })
    }
}

/// Nested format carried inside a field body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Processor {
    #[default]
    None,
    /// `tag(4) length(3) value` units, emitted as `PDS{tag}`.
    TagRollup,
    /// Chip data, emitted as `TAG{hex}` plus `ICC_DATA`.
    CompactTlv,
    /// Regex with named groups, emitted as `DE{n}_{GROUP}`.
    PositionalPattern(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub id: u8,
    pub name: String,
    pub kind: FieldKind,
    /// Fixed size, or the maximum size hint for variable fields.
    pub length: usize,
    pub value_type: ValueType,
    pub date_format: Option<String>,
    pub processor: Processor,
}

impl FieldSpec {
    pub fn new(id: u8, name: &str, kind: FieldKind, length: usize) -> Self {
        FieldSpec {
            id,
            name: name.to_string(),
            kind,
            length,
            value_type: ValueType::String,
            date_format: None,
            processor: Processor::None,
        }
    }

    pub fn fixed(id: u8, name: &str, length: usize) -> Self {
        Self::new(id, name, FieldKind::Fixed, length)
    }

    pub fn llvar(id: u8, name: &str, length: usize) -> Self {
        Self::new(id, name, FieldKind::VarLen2, length)
    }

    pub fn lllvar(id: u8, name: &str, length: usize) -> Self {
        Self::new(id, name, FieldKind::VarLen3, length)
    }

    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Datetime field with a chrono format string.
    pub fn with_date_format(mut self, format: &str) -> Self {
        self.value_type = ValueType::DateTime;
        self.date_format = Some(format.to_string());
        self
    }

    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processor = processor;
        self
    }

    pub fn date_format(&self) -> &str {
        self.date_format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if !(MIN_FIELD_ID..=MAX_FIELD_ID).contains(&self.id) {
            return Err(SchemaError::InvalidId(self.id as u32));
        }
        if let Processor::PositionalPattern(pattern) = &self.processor {
            Regex::new(pattern).map_err(|source| SchemaError::Pattern { field: self.id, source })?;
        }
        Ok(())
    }
}

/// Field catalog keyed by data element id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: BTreeMap<u8, FieldSpec>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    /// Build a schema, rejecting out-of-range and duplicate ids.
    pub fn from_fields<I>(fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = FieldSpec>,
    {
        let mut schema = Schema::new();
        for spec in fields {
            if schema.fields.contains_key(&spec.id) {
                return Err(SchemaError::Duplicate(spec.id));
            }
            schema.insert(spec)?;
        }
        Ok(schema)
    }

    /// Add or replace a definition; returns the one it replaced.
    pub fn insert(&mut self, spec: FieldSpec) -> Result<Option<FieldSpec>, SchemaError> {
        spec.validate()?;
        Ok(self.fields.insert(spec.id, spec))
    }

    pub fn get(&self, id: u8) -> Option<&FieldSpec> {
        self.fields.get(&id)
    }

    /// Definitions in ascending id order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    /// Ids of tag-rollup fields, ascending.
    pub fn rollup_fields(&self) -> Vec<u8> {
        self.fields
            .values()
            .filter(|f| f.processor == Processor::TagRollup)
            .map(|f| f.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Built-in catalog for card-network clearing (IPM) messages.
    pub fn card_network() -> Self {
        use ValueType::Integer;
        let specs = [
            FieldSpec::llvar(2, "Primary account number", 19),
            FieldSpec::fixed(3, "Processing code", 6),
            FieldSpec::fixed(4, "Amount, transaction", 12).with_type(Integer),
            FieldSpec::fixed(5, "Amount, reconciliation", 12).with_type(Integer),
            FieldSpec::fixed(6, "Amount, cardholder billing", 12).with_type(Integer),
            FieldSpec::fixed(9, "Conversion rate, reconciliation", 8).with_type(Integer),
            FieldSpec::fixed(10, "Conversion rate, cardholder billing", 8).with_type(Integer),
            FieldSpec::fixed(12, "Date/time, local transaction", 12).with_date_format("%y%m%d%H%M%S"),
            FieldSpec::fixed(14, "Expiration date", 4),
            FieldSpec::fixed(22, "Point of service data code", 12),
            FieldSpec::fixed(23, "Card sequence number", 3),
            FieldSpec::fixed(24, "Function code", 3),
            FieldSpec::fixed(25, "Message reason code", 4),
            FieldSpec::fixed(26, "Card acceptor business code", 4).with_type(Integer),
            FieldSpec::fixed(30, "Amounts, original", 24),
            FieldSpec::llvar(31, "Acquirer reference data", 23),
            FieldSpec::llvar(32, "Acquiring institution ID code", 11),
            FieldSpec::llvar(33, "Forwarding institution ID code", 11),
            FieldSpec::fixed(37, "Retrieval reference number", 12),
            FieldSpec::fixed(38, "Approval code", 6),
            FieldSpec::fixed(40, "Service code", 3),
            FieldSpec::fixed(41, "Card acceptor terminal ID", 8),
            FieldSpec::fixed(42, "Card acceptor ID code", 15),
            FieldSpec::llvar(43, "Card acceptor name/location", 99).with_processor(
                Processor::PositionalPattern(ACCEPTOR_LOCATION_PATTERN.to_string()),
            ),
            FieldSpec::lllvar(48, "Additional data", 999).with_processor(Processor::TagRollup),
            FieldSpec::fixed(49, "Currency code, transaction", 3),
            FieldSpec::fixed(50, "Currency code, reconciliation", 3),
            FieldSpec::fixed(51, "Currency code, cardholder billing", 3),
            FieldSpec::lllvar(54, "Amounts, additional", 999),
            FieldSpec::lllvar(55, "ICC system related data", 255).with_processor(Processor::CompactTlv),
            FieldSpec::lllvar(62, "Additional data 2", 999).with_processor(Processor::TagRollup),
            FieldSpec::lllvar(63, "Transaction lifecycle ID", 16),
            FieldSpec::fixed(71, "Message number", 8).with_type(Integer),
            FieldSpec::lllvar(72, "Data record", 999),
            FieldSpec::fixed(73, "Date, action", 6),
            FieldSpec::llvar(93, "Transaction destination institution ID code", 11),
            FieldSpec::llvar(94, "Transaction originator institution ID code", 11),
            FieldSpec::llvar(95, "Card issuer reference data", 10),
            FieldSpec::llvar(100, "Receiving institution ID code", 11),
            FieldSpec::lllvar(105, "Multi-use transaction identification data", 999),
            FieldSpec::lllvar(111, "Amount, currency conversion assignment", 999),
            FieldSpec::lllvar(123, "Additional data 3", 999).with_processor(Processor::TagRollup),
            FieldSpec::lllvar(124, "Additional data 4", 999).with_processor(Processor::TagRollup),
            FieldSpec::lllvar(125, "Additional data 5", 999).with_processor(Processor::TagRollup),
            FieldSpec::lllvar(127, "Network data", 999),
        ];
        Schema {
            fields: specs.into_iter().map(|f| (f.id, f)).collect(),
        }
    }
}

/// Shared read-only instance of [`Schema::card_network`].
pub fn default_schema() -> &'static Schema {
    static DEFAULT: OnceLock<Schema> = OnceLock::new();
    DEFAULT.get_or_init(Schema::card_network)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_network_catalog_is_valid() {
        let schema = default_schema();
        for spec in schema.fields() {
            spec.validate().expect("built-in field definition");
        }
        assert_eq!(schema.rollup_fields(), vec![48, 62, 123, 124, 125]);
        assert_eq!(schema.get(55).map(|f| &f.processor), Some(&Processor::CompactTlv));
        assert!(schema.get(1).is_none());
    }

    #[test]
    fn from_fields_rejects_duplicates_and_bad_ids() {
        let dup = Schema::from_fields([FieldSpec::fixed(3, "a", 6), FieldSpec::fixed(3, "b", 6)]);
        assert!(matches!(dup, Err(SchemaError::Duplicate(3))));
        let reserved = Schema::from_fields([FieldSpec::fixed(1, "bitmap", 8)]);
        assert!(matches!(reserved, Err(SchemaError::InvalidId(1))));
        let too_high = Schema::from_fields([FieldSpec::fixed(129, "x", 1)]);
        assert!(matches!(too_high, Err(SchemaError::InvalidId(129))));
    }

    #[test]
    fn insert_rejects_broken_pattern() {
        let mut schema = Schema::new();
        let spec = FieldSpec::llvar(43, "loc", 99)
            .with_processor(Processor::PositionalPattern("(?P<NAME>".to_string()));
        assert!(matches!(schema.insert(spec), Err(SchemaError::Pattern { field: 43, .. })));
    }
}
