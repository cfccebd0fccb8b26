//! Cube line-file writer.

use std::fmt::Write as _;

use serde_json::Value;

use crate::cube::pt_system::{PtRecordKind, PtSystem};
use crate::models::line::Line;
use crate::models::types::{value_to_string, ProgramType, RouteNode};

/// Attributes always written as quoted strings.
const QUOTED_ATTRIBUTES: [&str; 3] = ["NAME", "LONGNAME", "SHORTNAME"];

/// Render a complete line file: header, PT system records, then lines.
pub fn write_line_file<'a>(
    program: ProgramType,
    pt_system: &PtSystem,
    lines: impl IntoIterator<Item = &'a Line>,
) -> String {
    let mut out = format!(";;<<{program}>><<LINE>>;;\n");
    for kind in PtRecordKind::ALL {
        for (number, attributes) in pt_system.records(kind) {
            let _ = write!(out, "{kind} NUMBER={number}");
            for (key, value) in attributes {
                let _ = write!(out, ", {key}={}", format_value(key, value));
            }
            out.push('\n');
        }
    }
    for line in lines {
        out.push_str(&write_line(line));
    }
    out
}

/// One `LINE` block ending in a newline.
pub fn write_line(line: &Line) -> String {
    let mut out = format!("LINE NAME=\"{}\",\n", line.name);
    for (key, value) in &line.properties {
        let _ = writeln!(out, " {key}={},", format_value(key, value));
    }
    out.push_str(" NODES=\n");
    let nodes: Vec<String> = line.nodes.iter().map(|n| format!(" {}", format_node(n))).collect();
    out.push_str(&nodes.join(",\n"));
    out.push('\n');
    out
}

fn format_node(node: &RouteNode) -> String {
    let mut out = node.token();
    for (key, value) in &node.attributes {
        let _ = write!(out, ",{key}={}", format_value(key, value));
    }
    out
}

fn format_value(key: &str, value: &Value) -> String {
    match value {
        Value::String(s) if QUOTED_ATTRIBUTES.contains(&key) || !is_bare_token(s) => {
            format!("\"{s}\"")
        }
        Value::Bool(true) => "T".to_string(),
        Value::Bool(false) => "F".to_string(),
        other => value_to_string(other),
    }
}

/// A value that reads back as the same word without quotes.
fn is_bare_token(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic())
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}
