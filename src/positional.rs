//! Positional sub-fields extracted with a named-group pattern (card acceptor location).

use crate::value::{field_key, Message, Value};
use regex::Regex;
use tracing::trace;

/// Compile a field pattern so that it must match the whole field text.
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}

/// On a full match, emit `DE{id}_{GROUP}` for every named group that took part, with
/// trailing whitespace removed. No match emits nothing.
pub fn decode_into(field_id: u8, pattern: &Regex, text: &str, out: &mut Message) {
    let Some(caps) = pattern.captures(text) else {
        trace!(field = field_id, "positional pattern did not match");
        return;
    };
    let prefix = field_key(field_id);
    for name in pattern.capture_names().flatten() {
        if let Some(m) = caps.name(name) {
            out.insert(
                format!("{}_{}", prefix, name),
                Value::Str(m.as_str().trim_end().to_string()),
            );
        }
    }
}
