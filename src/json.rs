//! Compact JSON rendering of captured event values
//!
//! The wire format's rules differ from strict JSON in one place: float
//! NaN and infinities are emitted as the strings `"NaN"`, `"Infinity"`,
//! `"-Infinity"`, which the ingestion endpoint tolerates. Escaping covers
//! control characters, backslash, and double quote only; everything else,
//! including non-ASCII, passes through verbatim.

use crate::events::EventValue;
use crate::template::CaptureType;
use chrono::SecondsFormat;
use std::collections::HashSet;
use std::fmt::Write;

/// Appends `value` to `output` as a JSON literal.
///
/// `capture` governs composite values: `Stringify` renders the display
/// text, `Normal` expands sequences one level and stringifies everything
/// else, `Serialize` recurses structurally until `depth_remaining` runs
/// out. At `depth_remaining == 1` composites fall back to their display
/// text; scalars always render as literals.
pub fn write_literal(
    output: &mut String,
    value: &EventValue,
    capture: CaptureType,
    depth_remaining: usize,
) {
    if matches!(value, EventValue::Null) {
        output.push_str("null");
        return;
    }

    if capture == CaptureType::Stringify {
        write_string(output, &value.to_string());
        return;
    }

    match value {
        EventValue::Bool(v) => {
            output.push_str(if *v { "true" } else { "false" });
        }
        EventValue::Int(v) => {
            let _ = write!(output, "{}", v);
        }
        EventValue::UInt(v) => {
            let _ = write!(output, "{}", v);
        }
        EventValue::Float(v) => write_float(output, *v),
        EventValue::Char(v) => {
            let mut buf = [0u8; 4];
            write_string(output, v.encode_utf8(&mut buf));
        }
        EventValue::Str(v) => write_string(output, v),
        EventValue::Timestamp(v) => {
            output.push('"');
            let _ = write!(output, "{}", v.to_rfc3339_opts(SecondsFormat::Micros, true));
            output.push('"');
        }
        composite => {
            if depth_remaining <= 1 {
                write_string(output, &composite.to_string());
                return;
            }

            if capture == CaptureType::Normal {
                // One level of array expansion; other composites keep
                // their string form
                if matches!(composite, EventValue::Sequence(_)) {
                    write_literal(output, composite, CaptureType::Serialize, 2);
                } else {
                    write_string(output, &composite.to_string());
                }
                return;
            }

            match composite {
                EventValue::Sequence(items) => {
                    output.push('[');
                    let mut delimiter = "";
                    for item in items {
                        output.push_str(delimiter);
                        delimiter = ",";
                        write_literal(output, item, capture, depth_remaining - 1);
                    }
                    output.push(']');
                }
                EventValue::Map(entries) => {
                    output.push('{');
                    let mut seen = HashSet::new();
                    let mut delimiter = "";
                    for (key, entry) in entries {
                        if !seen.insert(key.as_str()) {
                            continue;
                        }
                        output.push_str(delimiter);
                        delimiter = ",";
                        write_string(output, key);
                        output.push(':');
                        write_literal(output, entry, capture, depth_remaining - 1);
                    }
                    output.push('}');
                }
                EventValue::Object(object) => {
                    output.push('{');
                    let mut delimiter = "";
                    for (name, read) in object.describe() {
                        output.push_str(delimiter);
                        delimiter = ",";
                        write_string(output, &name);
                        output.push(':');
                        match read {
                            Ok(entry) => {
                                write_literal(output, &entry, capture, depth_remaining - 1)
                            }
                            Err(description) => write_string(output, &description),
                        }
                    }
                    output.push('}');
                }
                _ => unreachable!("scalars are handled above"),
            }
        }
    }
}

fn write_float(output: &mut String, value: f64) {
    if value.is_nan() {
        output.push_str("\"NaN\"");
    } else if value.is_infinite() {
        output.push_str(if value > 0.0 {
            "\"Infinity\""
        } else {
            "\"-Infinity\""
        });
    } else {
        let _ = write!(output, "{}", value);
    }
}

/// Appends `value` as an escaped, quoted JSON string.
pub fn write_string(output: &mut String, value: &str) {
    output.push('"');
    escape_into(output, value);
    output.push('"');
}

fn escape_into(output: &mut String, s: &str) {
    let mut clean_start = 0;
    for (i, c) in s.char_indices() {
        if c < '\u{20}' || c == '\\' || c == '"' {
            output.push_str(&s[clean_start..i]);
            clean_start = i + c.len_utf8();
            match c {
                '"' => output.push_str("\\\""),
                '\\' => output.push_str("\\\\"),
                '\n' => output.push_str("\\n"),
                '\r' => output.push_str("\\r"),
                '\u{000C}' => output.push_str("\\f"),
                '\t' => output.push_str("\\t"),
                other => {
                    let _ = write!(output, "\\u{:04X}", other as u32);
                }
            }
        }
    }
    output.push_str(&s[clean_start..]);
}
