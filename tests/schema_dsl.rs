//! Schema definition language: syntax, semantics, and use of a parsed schema with the codec.

use ipmcodec::{
    parse_schema, BitmapEncoding, Codec, FieldKind, Message, Processor, SchemaError, TextEncoding,
    Value, ValueType,
};

const CATALOG: &str = r#"
# Minimal clearing catalog
2:  llvar(19)                          "Primary account number";
4:  fixed(12) int                      "Amount, transaction";
6:  fixed(12) decimal;
12: fixed(12) datetime("%y%m%d%H%M%S") "Date/time, local transaction";
14: fixed(4) datetime("%y%m");
24: fixed(3) string                    "Function code";
43: llvar(99) pattern("(?P<NAME>[^\\]+)\\(?P<CITY>.+)") "Card acceptor";
48: lllvar(999) rollup                 "Additional data";
55: lllvar(255) tlv;
62: lllvar(999) rollup;
"#;

#[test]
fn parse_catalog_fields() {
    let schema = parse_schema(CATALOG).expect("parse");
    assert_eq!(schema.len(), 10);

    let pan = schema.get(2).expect("DE2");
    assert_eq!(pan.kind, FieldKind::VarLen2);
    assert_eq!(pan.length, 19);
    assert_eq!(pan.name, "Primary account number");
    assert_eq!(pan.value_type, ValueType::String);

    assert_eq!(schema.get(4).map(|f| f.value_type), Some(ValueType::Integer));
    let de6 = schema.get(6).expect("DE6");
    assert_eq!(de6.value_type, ValueType::Decimal);
    assert_eq!(de6.name, "");

    let de12 = schema.get(12).expect("DE12");
    assert_eq!(de12.value_type, ValueType::DateTime);
    assert_eq!(de12.date_format(), "%y%m%d%H%M%S");
    assert_eq!(schema.get(14).map(|f| f.date_format()), Some("%y%m"));

    assert_eq!(schema.get(55).map(|f| &f.processor), Some(&Processor::CompactTlv));
    assert_eq!(schema.rollup_fields(), vec![48, 62]);
    assert!(matches!(
        schema.get(43).map(|f| &f.processor),
        Some(Processor::PositionalPattern(p)) if p == r"(?P<NAME>[^\\]+)\\(?P<CITY>.+)"
    ));
}

#[test]
fn datetime_without_format_uses_default() {
    let schema = parse_schema("73: fixed(6) datetime;").expect("parse");
    assert_eq!(schema.get(73).map(|f| f.date_format()), Some("%y%m%d"));
}

#[test]
fn parse_empty_and_comment_only() {
    assert!(parse_schema("").expect("empty").is_empty());
    assert!(parse_schema("# nothing here\n").expect("comment").is_empty());
}

#[test]
fn syntax_errors() {
    for src in [
        "2 llvar(19);",
        "2: varchar(19);",
        "2: llvar(19)",
        "2: llvar();",
        "2: fixed(3) int rollup \"unterminated;",
        "x: fixed(3);",
    ] {
        assert!(matches!(parse_schema(src), Err(SchemaError::Parse(_))), "{:?} should not parse", src);
    }
}

#[test]
fn id_out_of_range() {
    assert!(matches!(parse_schema("1: fixed(8);"), Err(SchemaError::InvalidId(1))));
    assert!(matches!(parse_schema("129: fixed(8);"), Err(SchemaError::InvalidId(129))));
    assert!(matches!(parse_schema("300: fixed(8);"), Err(SchemaError::InvalidId(300))));
}

#[test]
fn duplicate_id() {
    let src = "3: fixed(6);\n3: fixed(6) \"again\";";
    assert!(matches!(parse_schema(src), Err(SchemaError::Duplicate(3))));
}

#[test]
fn pattern_must_compile() {
    let src = r#"43: llvar(99) pattern("(?P<NAME>");"#;
    assert!(matches!(parse_schema(src), Err(SchemaError::Pattern { field: 43, .. })));
}

#[test]
fn parsed_schema_drives_codec() {
    let schema = parse_schema(CATALOG).expect("parse");
    let codec = Codec::new(schema, TextEncoding::Ascii, BitmapEncoding::Hex);
    let input: Message = [
        ("MTI", Value::from("1240")),
        ("DE2", Value::from("5100000000000001")),
        ("DE4", Value::Int(2500)),
        ("DE24", Value::from("200")),
        ("DE43", Value::from("Corner Cafe\\Sydney")),
        ("PDS0023", Value::from("CT6")),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    let decoded = codec.unpack(&codec.pack(&input).expect("pack")).expect("unpack");
    for (key, value) in &input {
        assert_eq!(decoded.get(key), Some(value), "key {}", key);
    }
    assert_eq!(decoded.get("DE48"), Some(&Value::from("0023003CT6")));
    assert_eq!(decoded.get("DE43_NAME"), Some(&Value::from("Corner Cafe")));
    assert_eq!(decoded.get("DE43_CITY"), Some(&Value::from("Sydney")));
}

#[test]
fn decimal_field_decodes() {
    let schema = parse_schema("6: fixed(6) decimal;").expect("parse");
    let codec = Codec::new(schema, TextEncoding::Latin1, BitmapEncoding::Binary);
    let mut bytes = b"1240".to_vec();
    let mut bitmap = [0u8; 16];
    bitmap[0] = 0x84;
    bytes.extend_from_slice(&bitmap);
    bytes.extend_from_slice(b"012.50");
    let decoded = codec.unpack(&bytes).expect("unpack");
    let amount = decoded["DE6"].as_decimal().expect("decimal");
    assert_eq!(amount.to_string(), "12.50");
}

#[test]
fn fixed_decimal_field_round_trips() {
    let schema = parse_schema("6: fixed(12) decimal;").expect("parse");
    let codec = Codec::new(schema, TextEncoding::Latin1, BitmapEncoding::Binary);
    for text in ["12.50", "-3.1", "0"] {
        let amount = rust_decimal::Decimal::from_str_exact(text).expect("decimal");
        let input: Message = [
            ("MTI".to_string(), Value::from("1240")),
            ("DE6".to_string(), Value::Decimal(amount)),
        ]
        .into_iter()
        .collect();
        let bytes = codec.pack(&input).expect("pack");
        assert_eq!(bytes.len(), 20 + 12);
        assert!(!bytes[20..].contains(&b' '), "{:?} must be zero padded", text);
        let decoded = codec.unpack(&bytes).expect("unpack");
        assert_eq!(decoded["DE6"].as_decimal(), Some(amount));
    }
}
