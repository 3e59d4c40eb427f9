//! Message-template parsing and rendering
//!
//! Templates contain named holes (`{Volume}`), positional holes (`{0}`),
//! or doubled braces for literals (`{{`). A hole may carry an alignment
//! and a format specifier (`{Size,8:000}`), and a capture prefix: `@`
//! captures the argument's structure, `$` forces its string form.

use crate::events::{EventValue, LogEvent};
use std::fmt::Write;

/// How a composite argument is turned into a JSON value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureType {
    Normal,
    Serialize,
    Stringify,
}

/// One placeholder occurrence within a template.
#[derive(Clone, Debug, PartialEq)]
pub struct Hole {
    pub label: HoleLabel,
    pub alignment: Option<i32>,
    pub format: Option<String>,
    pub capture: CaptureType,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HoleLabel {
    Name(String),
    Index(usize),
}

/// A successfully parsed template: the raw text plus its holes in order.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    pub raw: String,
    pub holes: Vec<Hole>,
}

impl Template {
    /// True when every hole is an index hole and at least one exists.
    /// Positional templates are legacy format strings; they ship the
    /// formatted text rather than the raw template.
    pub fn is_positional(&self) -> bool {
        !self.holes.is_empty()
            && self
                .holes
                .iter()
                .all(|hole| matches!(hole.label, HoleLabel::Index(_)))
    }
}

/// Parses `message` as a message template. `None` marks "no template":
/// unbalanced braces, empty or malformed holes. Callers fall back to the
/// literal message text.
pub fn parse_template(message: &str) -> Option<Template> {
    let mut holes = Vec::new();
    let bytes = message.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                if bytes.get(i + 1) == Some(&b'{') {
                    i += 2;
                    continue;
                }
                let close = message[i + 1..].find('}')? + i + 1;
                let hole = parse_hole(&message[i + 1..close])?;
                holes.push(hole);
                i = close + 1;
            }
            b'}' => {
                // A lone closing brace is only valid when doubled
                if bytes.get(i + 1) == Some(&b'}') {
                    i += 2;
                } else {
                    return None;
                }
            }
            _ => i += 1,
        }
    }

    Some(Template {
        raw: message.to_string(),
        holes,
    })
}

fn parse_hole(body: &str) -> Option<Hole> {
    let (capture, body) = match body.as_bytes().first()? {
        b'@' => (CaptureType::Serialize, &body[1..]),
        b'$' => (CaptureType::Stringify, &body[1..]),
        _ => (CaptureType::Normal, body),
    };

    // Split off the format first so alignment parsing never sees it
    let (head, format) = match body.find(':') {
        Some(pos) => (&body[..pos], Some(body[pos + 1..].to_string())),
        None => (body, None),
    };

    let (label, alignment) = match head.find(',') {
        Some(pos) => {
            let alignment = head[pos + 1..].parse::<i32>().ok()?;
            (&head[..pos], Some(alignment))
        }
        None => (head, None),
    };

    if label.is_empty() {
        return None;
    }

    let label = if label.bytes().all(|b| b.is_ascii_digit()) {
        HoleLabel::Index(label.parse().ok()?)
    } else {
        if !label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return None;
        }
        HoleLabel::Name(label.to_string())
    };

    Some(Hole {
        label,
        alignment,
        format,
        capture,
    })
}

/// Renders the value a hole refers to: the matching named property, or the
/// positional parameter at the hole's ordinal. Absent names and
/// out-of-range indexes render as the empty string.
pub fn render_hole_value(event: &LogEvent, template: &Template, hole_position: usize) -> String {
    let hole = &template.holes[hole_position];
    let value = match &hole.label {
        HoleLabel::Name(name) => event
            .property(name)
            .cloned()
            .or_else(|| event.parameters.get(hole_position).cloned()),
        HoleLabel::Index(index) => event.parameters.get(*index).cloned(),
    };

    match value {
        Some(value) => apply_format(&value, hole.alignment, hole.format.as_deref()),
        None => String::new(),
    }
}

/// Substitutes every hole to produce the formatted message text.
pub fn render_message(event: &LogEvent, template: &Template) -> String {
    let mut rendered = String::with_capacity(template.raw.len());
    let message = template.raw.as_str();
    let bytes = message.as_bytes();
    let mut hole_position = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                rendered.push('{');
                i += 2;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                rendered.push('}');
                i += 2;
            }
            b'{' => {
                // parse_template already validated every hole
                let close = match message[i + 1..].find('}') {
                    Some(pos) => pos + i + 1,
                    None => break,
                };
                rendered.push_str(&render_hole_value(event, template, hole_position));
                hole_position += 1;
                i = close + 1;
            }
            _ => {
                let c = message[i..].chars().next().unwrap_or('\u{fffd}');
                rendered.push(c);
                i += c.len_utf8();
            }
        }
    }

    rendered
}

/// Applies a format specifier and alignment to a value's text.
///
/// The recognized specifiers are the ones the wire format's renderings
/// exercise: `000`-style zero padding, `x`/`X` hex with optional width,
/// `F`/`f` fixed decimals, `D`/`d` decimal width. Anything else falls back
/// to the value's display text.
fn apply_format(value: &EventValue, alignment: Option<i32>, format: Option<&str>) -> String {
    let text = match format {
        Some(spec) => format_with_spec(value, spec),
        None => value.to_string(),
    };

    match alignment {
        Some(requested) => {
            let width = requested.unsigned_abs() as usize;
            if text.len() >= width {
                text
            } else if requested < 0 {
                format!("{:<width$}", text)
            } else {
                format!("{:>width$}", text)
            }
        }
        None => text,
    }
}

fn format_with_spec(value: &EventValue, spec: &str) -> String {
    let integral: Option<i128> = match value {
        EventValue::Int(v) => Some(*v as i128),
        EventValue::UInt(v) => Some(*v as i128),
        _ => None,
    };

    if !spec.is_empty() && spec.bytes().all(|b| b == b'0') {
        if let Some(v) = integral {
            return format!("{:0width$}", v, width = spec.len());
        }
    }

    if let Some(rest) = spec.strip_prefix('x').or_else(|| spec.strip_prefix('X')) {
        if let Some(v) = integral {
            let width = rest.parse::<usize>().unwrap_or(0);
            let mut hex = format!("{:0width$x}", v, width = width);
            if spec.starts_with('X') {
                hex = hex.to_ascii_uppercase();
            }
            return hex;
        }
    }

    if let Some(rest) = spec.strip_prefix('D').or_else(|| spec.strip_prefix('d')) {
        if let Some(v) = integral {
            let width = rest.parse::<usize>().unwrap_or(0);
            return format!("{:0width$}", v, width = width);
        }
    }

    if let Some(rest) = spec.strip_prefix('F').or_else(|| spec.strip_prefix('f')) {
        let float = match value {
            EventValue::Float(v) => Some(*v),
            EventValue::Int(v) => Some(*v as f64),
            EventValue::UInt(v) => Some(*v as f64),
            _ => None,
        };
        if let (Some(v), Ok(decimals)) = (float, rest.parse::<usize>()) {
            let mut out = String::new();
            let _ = write!(out, "{:.decimals$}", v);
            return out;
        }
    }

    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::levels::Level;

    fn template(message: &str) -> Template {
        parse_template(message).expect("template should parse")
    }

    #[test]
    fn test_plain_text_parses_with_no_holes() {
        let parsed = template("No properties");
        assert!(parsed.holes.is_empty());
        assert!(!parsed.is_positional());
    }

    #[test]
    fn test_named_hole() {
        let parsed = template("One {Property}");
        assert_eq!(parsed.holes.len(), 1);
        assert_eq!(
            parsed.holes[0].label,
            HoleLabel::Name("Property".to_string())
        );
        assert_eq!(parsed.holes[0].capture, CaptureType::Normal);
        assert!(!parsed.is_positional());
    }

    #[test]
    fn test_positional_holes() {
        let parsed = template("Goodbye, {0}, from {1}");
        assert_eq!(parsed.holes.len(), 2);
        assert!(parsed.is_positional());
    }

    #[test]
    fn test_mixed_holes_are_not_positional() {
        let parsed = template("{0} and {Name}");
        assert!(!parsed.is_positional());
    }

    #[test]
    fn test_capture_prefixes() {
        let parsed = template("Some {@Data} and {$Other}");
        assert_eq!(parsed.holes[0].capture, CaptureType::Serialize);
        assert_eq!(parsed.holes[1].capture, CaptureType::Stringify);
    }

    #[test]
    fn test_format_and_alignment() {
        let parsed = template("{Size,8:000}");
        assert_eq!(parsed.holes[0].alignment, Some(8));
        assert_eq!(parsed.holes[0].format.as_deref(), Some("000"));
    }

    #[test]
    fn test_doubled_braces_are_literal() {
        let parsed = template("{{not a hole}}");
        assert!(parsed.holes.is_empty());

        let event = LogEvent::new(Level::Info, "{{not a hole}}");
        assert_eq!(render_message(&event, &parsed), "{not a hole}");
    }

    #[test]
    fn test_malformed_templates_do_not_parse() {
        assert_eq!(parse_template("Unbalanced {"), None);
        assert_eq!(parse_template("Unbalanced }"), None);
        assert_eq!(parse_template("Empty {}"), None);
        assert_eq!(parse_template("Bad {na me}"), None);
    }

    #[test]
    fn test_render_positional_message() {
        let event = LogEvent::new(Level::Info, "Goodbye, {0}, from {1}")
            .with_parameters(vec!["Seq".into(), "NLog".into()]);
        let parsed = template(&event.message);

        assert_eq!(render_message(&event, &parsed), "Goodbye, Seq, from NLog");
    }

    #[test]
    fn test_render_named_message_binds_parameters() {
        let event = LogEvent::new(Level::Info, "One {Property}").with_parameters(vec![42.into()]);
        let parsed = template(&event.message);

        assert_eq!(render_message(&event, &parsed), "One 42");
    }

    #[test]
    fn test_out_of_range_hole_renders_empty() {
        let event = LogEvent::new(Level::Info, "Value {3}").with_parameters(vec![1.into()]);
        let parsed = template(&event.message);

        assert_eq!(render_message(&event, &parsed), "Value ");
    }

    #[test]
    fn test_zero_padding_format() {
        let event = LogEvent::new(Level::Info, "The number is {0:000}")
            .with_parameters(vec![42.into()]);
        let parsed = template(&event.message);

        assert_eq!(render_hole_value(&event, &parsed, 0), "042");
    }

    #[test]
    fn test_hex_format() {
        let event = LogEvent::new(Level::Info, "One {Rendering:x8}")
            .with_parameters(vec![42.into()]);
        let parsed = template(&event.message);

        assert_eq!(render_hole_value(&event, &parsed, 0), "0000002a");
    }

    #[test]
    fn test_fixed_decimals_format() {
        let event =
            LogEvent::new(Level::Info, "Total {Amount:F2}").with_parameters(vec![1.5.into()]);
        let parsed = template(&event.message);

        assert_eq!(render_hole_value(&event, &parsed, 0), "1.50");
    }

    #[test]
    fn test_alignment_pads() {
        let event = LogEvent::new(Level::Info, "{Name,6}|{Name,-6}|")
            .with_property("Name", "ab");
        let parsed = template(&event.message);

        assert_eq!(render_message(&event, &parsed), "    ab|ab    |");
    }
}
