//! Event encoding into compact newline-delimited JSON lines
//!
//! One call produces one self-describing JSON object: `@t` timestamp,
//! `@mt` raw template (or `@m` formatted text), `@r` renderings, `@l`
//! level, `@x` error text, `@tr`/`@sp` correlation ids, then properties.
//! Encoding is deterministic and never fails; malformed templates fall
//! back to the literal message.

use crate::config::ExtraProperty;
use crate::events::LogEvent;
use crate::json;
use crate::levels::Level;
use crate::template::{self, CaptureType, HoleLabel, Template};
use chrono::SecondsFormat;
use std::collections::HashSet;
use std::fmt::Write;

/// Encodes one event as a single JSON line (no trailing newline).
pub fn encode_event(
    event: &LogEvent,
    extra_properties: &[ExtraProperty],
    max_structure_depth: usize,
) -> String {
    let mut out = String::with_capacity(256);
    let depth = max_structure_depth + 1;

    out.push_str("{\"@t\":\"");
    let _ = write!(
        out,
        "{}",
        event.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    );
    out.push('"');

    let parsed = template::parse_template(&event.message);

    // Named templates ship raw with `@mt`; positional templates are legacy
    // format strings and ship their formatted text, with the arguments
    // recorded under their ordinals below.
    let positional = matches!(&parsed, Some(t) if t.is_positional() && !event.parameters.is_empty());
    match (&parsed, positional) {
        (Some(t), false) => {
            out.push_str(",\"@mt\":");
            json::write_string(&mut out, &t.raw);
        }
        (Some(t), true) => {
            out.push_str(",\"@m\":");
            json::write_string(&mut out, &template::render_message(event, t));
        }
        (None, _) => {
            out.push_str(",\"@m\":");
            json::write_string(&mut out, &event.message);
        }
    }

    if let Some(t) = &parsed {
        write_renderings(&mut out, event, t);
    }

    if event.level != Level::Info {
        out.push_str(",\"@l\":\"");
        let _ = write!(out, "{}", event.level);
        out.push('"');
    }

    if let Some(error) = &event.error {
        out.push_str(",\"@x\":");
        json::write_string(&mut out, error);
    }

    if let Some(trace_id) = &event.trace_id {
        out.push_str(",\"@tr\":");
        json::write_string(&mut out, trace_id);
    }

    if let Some(span_id) = &event.span_id {
        out.push_str(",\"@sp\":");
        json::write_string(&mut out, span_id);
    }

    let mut seen: HashSet<String> = HashSet::new();

    for property in extra_properties {
        let name = escape_key(&property.name);
        if seen.contains(&name) {
            continue;
        }
        seen.insert(name.clone());

        out.push(',');
        json::write_string(&mut out, &name);
        out.push(':');

        let rendered = property.value.render(event);
        if property.as_number {
            if let Ok(number) = rendered.parse::<f64>() {
                if number.is_finite() {
                    let _ = write!(out, "{}", number);
                    continue;
                }
            }
        }

        json::write_string(&mut out, &rendered);
    }

    if positional {
        for (index, parameter) in event.parameters.iter().enumerate() {
            let name = index.to_string();
            if seen.contains(&name) {
                continue;
            }
            seen.insert(name.clone());

            out.push(',');
            json::write_string(&mut out, &name);
            out.push(':');
            json::write_literal(&mut out, parameter, CaptureType::Normal, depth);
        }
    }

    for (name, value) in &event.properties {
        let key = escape_key(name);
        if seen.contains(&key) {
            continue;
        }
        seen.insert(key.clone());

        out.push(',');
        json::write_string(&mut out, &key);
        out.push(':');
        json::write_literal(&mut out, value, capture_for(&parsed, name), depth);
    }

    // The host framework binds template arguments to named holes by
    // ordinal; a hole with no matching property captures its argument here
    if let Some(t) = &parsed {
        if !t.is_positional() {
            for (position, hole) in t.holes.iter().enumerate() {
                let HoleLabel::Name(name) = &hole.label else {
                    continue;
                };
                let key = escape_key(name);
                if seen.contains(&key) {
                    continue;
                }
                let Some(parameter) = event.parameters.get(position) else {
                    continue;
                };
                seen.insert(key.clone());

                out.push(',');
                json::write_string(&mut out, &key);
                out.push(':');
                json::write_literal(&mut out, parameter, hole.capture, depth);
            }
        }
    }

    out.push('}');
    out
}

fn write_renderings(out: &mut String, event: &LogEvent, parsed: &Template) {
    let mut delimiter = "";
    for (position, hole) in parsed.holes.iter().enumerate() {
        if hole.format.is_none() {
            continue;
        }
        if delimiter.is_empty() {
            out.push_str(",\"@r\":[");
        }
        out.push_str(delimiter);
        delimiter = ",";
        json::write_string(out, &template::render_hole_value(event, parsed, position));
    }
    if !delimiter.is_empty() {
        out.push(']');
    }
}

fn capture_for(parsed: &Option<Template>, property_name: &str) -> CaptureType {
    let Some(template) = parsed else {
        return CaptureType::Normal;
    };
    template
        .holes
        .iter()
        .find_map(|hole| match &hole.label {
            HoleLabel::Name(name) if name == property_name => Some(hole.capture),
            _ => None,
        })
        .unwrap_or(CaptureType::Normal)
}

/// Keys starting with `@` double the first character so they cannot be
/// confused with the format's reserved fields.
fn escape_key(key: &str) -> String {
    if key.starts_with('@') {
        format!("@{}", key)
    } else {
        key.to_string()
    }
}
