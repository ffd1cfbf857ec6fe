//! Format decoded messages for display.

use crate::value::{Message, Value, MTI_KEY};
use std::cmp::Ordering;

/// Sort rank of a message key: MTI, then data elements by id, then derived keys.
fn key_rank(key: &str) -> (u8, u32) {
    if key == MTI_KEY {
        return (0, 0);
    }
    match key.strip_prefix("DE").and_then(|id| id.parse::<u32>().ok()) {
        Some(id) => (1, id),
        None => (2, 0),
    }
}

fn compare_keys(a: &str, b: &str) -> Ordering {
    key_rank(a).cmp(&key_rank(b)).then_with(|| a.cmp(b))
}

fn value_to_dump(v: &Value) -> String {
    match v {
        Value::Bytes(b) => format!("hex({})", hex::encode_upper(b)),
        Value::Str(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}

/// One `KEY = value` line per entry, in display order.
pub fn format_message(message: &Message) -> String {
    let mut keys: Vec<&String> = message.keys().collect();
    keys.sort_by(|a, b| compare_keys(a, b));
    let mut out = String::new();
    for key in keys {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(&value_to_dump(&message[key]));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mti_then_fields_then_derived() {
        let mut m = Message::new();
        m.insert("PDS0023".to_string(), Value::from("CT6"));
        m.insert("DE48".to_string(), Value::from("0023003CT6"));
        m.insert("DE4".to_string(), Value::Int(100));
        m.insert("MTI".to_string(), Value::from("1240"));
        m.insert("DE55".to_string(), Value::Bytes(vec![0x9F, 0x02]));
        let text = format_message(&m);
        let keys: Vec<&str> = text.lines().map(|l| l.split(" = ").next().unwrap_or("")).collect();
        assert_eq!(keys, vec!["MTI", "DE4", "DE48", "DE55", "PDS0023"]);
        assert!(text.contains("DE55 = hex(9F02)"));
        assert!(text.contains("DE4 = 100"));
    }
}
