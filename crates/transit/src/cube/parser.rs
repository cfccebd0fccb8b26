//! Parser for Cube PT/TRNBUILD line files.
//!
//! A file is a sequence of blocks. `LINE` blocks hold `ATTR=value` pairs and
//! a node list introduced by `N=` or `NODES=`; `OPERATOR`, `MODE`,
//! `VEHICLETYPE`, `WAITCRVDEF` and `CROWDCRVDEF` blocks are PT system records.
//! A malformed block is reported as a [`ParseDiagnostic`] and skipped.

use log::{debug, warn};
use serde_json::{Map, Number, Value};

use crate::cube::lexer::{Lexer, Token, TokenKind};
use crate::cube::pt_system::{PtRecordKind, PtSystem};
use crate::models::line::Line;
use crate::models::types::{ParseDiagnostic, ProgramType, RouteNode};

/// Keywords that attach to the preceding node inside a node list.
pub const NODE_ATTRIBUTES: [&str; 7] = ["ACCESS_C", "ACCESS", "DELAY", "XYSPEED", "TIMEFAC", "NNTIME", "TIME"];

/// Result of parsing one line-file document.
#[derive(Clone, Debug, Default)]
pub struct ParsedLineFile {
    pub program: Option<ProgramType>,
    pub lines: Vec<Line>,
    pub pt_system: PtSystem,
    pub diagnostics: Vec<ParseDiagnostic>,
}

pub fn parse_line_file(source: &str) -> ParsedLineFile {
    let (tokens, lex_error) = Lexer::new(source).tokenize();
    let mut parser = Parser {
        tokens,
        pos: 0,
        parsed: ParsedLineFile::default(),
    };
    parser.run();

    let mut parsed = parser.parsed;
    if let Some(err) = lex_error {
        parsed.diagnostics.push(ParseDiagnostic {
            line_number: err.line,
            line_name: None,
            message: err.message,
        });
    }
    for diagnostic in &parsed.diagnostics {
        warn!("Skipped line file block at {diagnostic}");
    }
    debug!(
        "Parsed {} lines and {} PT system records",
        parsed.lines.len(),
        parsed.pt_system.len()
    );
    parsed
}

/// Upper-case an attribute name and normalise `USERAn` to `USERA[n]`.
pub fn normalize_attribute(name: &str) -> String {
    let upper = name.to_ascii_uppercase();
    match upper.strip_prefix("USERA") {
        Some(n) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => format!("USERA[{n}]"),
        _ => upper,
    }
}

fn number_from_text(text: &str) -> Option<Value> {
    let trimmed = text.strip_prefix('+').unwrap_or(text);
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(Value::from(n));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

struct BlockError {
    line: usize,
    message: String,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    parsed: ParsedLineFile,
}

impl Parser {
    fn run(&mut self) {
        while let Some(token) = self.peek() {
            let line = token.line;
            match token.kind.clone() {
                TokenKind::Header(program) => {
                    self.pos += 1;
                    self.parsed.program.get_or_insert(program);
                }
                TokenKind::Word(word) if word.eq_ignore_ascii_case("LINE") => {
                    self.pos += 1;
                    self.line_block(line);
                }
                TokenKind::Word(word) if self.is_record_start(&word) => {
                    self.pos += 1;
                    self.record_block(&word, line);
                }
                TokenKind::Comma => self.pos += 1,
                other => {
                    self.report(line, None, format!("unexpected {} outside of a block", describe(&other)));
                    self.pos += 1;
                    self.skip_to_block();
                }
            }
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    /// A record keyword starts a block only when it is not an `ATTR=` pair.
    fn is_record_start(&self, word: &str) -> bool {
        PtRecordKind::from_keyword(word).is_some() && self.peek_kind(1) != Some(&TokenKind::Equals)
    }

    fn at_block_start(&self) -> bool {
        match self.peek_kind(0) {
            Some(TokenKind::Word(word)) => word.eq_ignore_ascii_case("LINE") || self.is_record_start(word),
            Some(TokenKind::Header(_)) => true,
            _ => false,
        }
    }

    fn skip_to_block(&mut self) {
        while self.peek().is_some() && !self.at_block_start() {
            self.pos += 1;
        }
    }

    fn report(&mut self, line_number: usize, line_name: Option<String>, message: String) {
        self.parsed.diagnostics.push(ParseDiagnostic {
            line_number,
            line_name,
            message,
        });
    }

    /// `ATTR =` at the cursor; consumes both tokens.
    fn attribute_name(&mut self) -> Option<String> {
        match (self.peek_kind(0), self.peek_kind(1)) {
            (Some(TokenKind::Word(word)), Some(TokenKind::Equals)) => {
                let word = word.clone();
                self.pos += 2;
                Some(word)
            }
            _ => None,
        }
    }

    fn value(&mut self, attribute: &str) -> Result<Value, BlockError> {
        let token = self.tokens.get(self.pos).cloned();
        let line = token.as_ref().map(|t| t.line).unwrap_or_else(|| self.last_line());
        let value = match token.map(|t| t.kind) {
            Some(TokenKind::Str(s)) => Value::String(s),
            Some(TokenKind::Word(w)) if !self.is_pair_at(self.pos) => Value::String(w),
            Some(TokenKind::Number(n)) => number_from_text(&n).ok_or_else(|| BlockError {
                line,
                message: format!("invalid number '{n}' for {attribute}"),
            })?,
            _ => {
                return Err(BlockError {
                    line,
                    message: format!("missing value for {attribute}"),
                })
            }
        };
        self.pos += 1;
        Ok(value)
    }

    fn is_pair_at(&self, pos: usize) -> bool {
        matches!(self.tokens.get(pos + 1).map(|t| &t.kind), Some(TokenKind::Equals))
    }

    fn last_line(&self) -> usize {
        self.tokens.last().map(|t| t.line).unwrap_or(1)
    }

    fn line_block(&mut self, start_line: usize) {
        let mut name: Option<String> = None;
        match self.line_body(&mut name) {
            Ok(mut line) => {
                let Some(line_name) = name else {
                    self.report(start_line, None, "LINE block has no NAME".to_string());
                    return;
                };
                if line.nodes.is_empty() {
                    self.report(start_line, Some(line_name), "line has no nodes".to_string());
                    return;
                }
                line.name = line_name.into();
                self.parsed.lines.push(line);
            }
            Err(err) => {
                self.report(err.line, name, err.message);
                self.skip_to_block();
            }
        }
    }

    fn line_body(&mut self, name: &mut Option<String>) -> Result<Line, BlockError> {
        let mut line = Line::new("");
        let mut in_nodes = false;

        while let Some(token) = self.peek() {
            let token_line = token.line;
            if self.at_block_start() {
                break;
            }
            if let Some(raw) = self.attribute_name() {
                let key = normalize_attribute(&raw);
                if key == "N" || key == "NODES" {
                    in_nodes = true;
                    continue;
                }
                let value = self.value(&key)?;
                if in_nodes && NODE_ATTRIBUTES.contains(&key.as_str()) {
                    let node = line.nodes.last_mut().ok_or_else(|| BlockError {
                        line: token_line,
                        message: format!("node attribute {key} before any node"),
                    })?;
                    node.attributes.insert(key, value);
                    continue;
                }
                in_nodes = false;
                if key == "NAME" {
                    *name = Some(match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    });
                } else {
                    line.properties.insert(key, value);
                }
                continue;
            }

            match self.peek_kind(0).cloned() {
                Some(TokenKind::Comma) => self.pos += 1,
                Some(TokenKind::Number(text)) if in_nodes => {
                    let id: i64 = text.strip_prefix('+').unwrap_or(&text).parse().map_err(|_| BlockError {
                        line: token_line,
                        message: format!("invalid node number '{text}'"),
                    })?;
                    let order = line.nodes.len() + 1;
                    line.nodes.push(RouteNode::new(id, order));
                    self.pos += 1;
                }
                Some(other) => {
                    return Err(BlockError {
                        line: token_line,
                        message: format!("unexpected {}", describe(&other)),
                    })
                }
                None => break,
            }
        }
        Ok(line)
    }

    fn record_block(&mut self, keyword: &str, start_line: usize) {
        let Some(kind) = PtRecordKind::from_keyword(keyword) else {
            return;
        };
        let mut attributes = Map::new();
        let mut number: Option<i64> = None;

        while self.peek().is_some() && !self.at_block_start() {
            if let Some(raw) = self.attribute_name() {
                let key = normalize_attribute(&raw);
                match self.value(&key) {
                    Ok(value) if key == "NUMBER" => number = value.as_i64(),
                    Ok(value) => {
                        attributes.insert(key, value);
                    }
                    Err(err) => {
                        self.report(err.line, None, format!("{kind} record: {}", err.message));
                        self.skip_to_block();
                        return;
                    }
                }
                continue;
            }
            match self.peek_kind(0) {
                Some(TokenKind::Comma) => self.pos += 1,
                _ => {
                    let line = self.peek().map(|t| t.line).unwrap_or(start_line);
                    self.report(line, None, format!("unexpected token in {kind} record"));
                    self.skip_to_block();
                    return;
                }
            }
        }

        match number {
            Some(number) => {
                if let Err(err) = self.parsed.pt_system.insert(kind, number, attributes) {
                    self.report(start_line, None, err.to_string());
                }
            }
            None => self.report(start_line, None, format!("{kind} record has no integer NUMBER")),
        }
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Header(_) => "program header".to_string(),
        TokenKind::Word(w) => format!("'{w}'"),
        TokenKind::Str(s) => format!("string \"{s}\""),
        TokenKind::Number(n) => format!("number {n}"),
        TokenKind::Equals => "'='".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Unexpected(c) => format!("character '{c}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#";;<<PT>><<LINE>>;;
LINE NAME="0_452-111_452_pk1",
 MODE=5,
 HEADWAY[1]=10,
 NODES=
 39249,
 -39240,
 54648
LINE NAME="0_134-111_134_pk1", LONGNAME="Ltd Stop - Highland - Cleveland - Cretin - Mpls",
 HEADWAY[1]=20, MODE=5, ONEWAY=T, OPERATOR=3, usera1="ABC",
 NODES= 39249, -39240, 54648, 43503,ACCESS=-1, -55786, 20208,NNTIME=1.5, 55787
"#;

    #[test]
    fn test_parse_sample_lines() {
        let parsed = parse_line_file(SAMPLE);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        assert_eq!(parsed.program, Some(ProgramType::Pt));
        assert_eq!(parsed.lines.len(), 2);

        let first = &parsed.lines[0];
        assert_eq!(first.name.as_str(), "0_452-111_452_pk1");
        assert_eq!(first.properties["MODE"], Value::from(5));
        assert_eq!(first.properties["HEADWAY[1]"], Value::from(10));
        assert_eq!(first.routing_tokens(), vec!["39249", "-39240", "54648"]);

        let second = &parsed.lines[1];
        assert_eq!(second.properties["ONEWAY"], Value::from("T"));
        assert_eq!(second.properties["USERA[1]"], Value::from("ABC"));
        assert_eq!(
            second.properties["LONGNAME"],
            Value::from("Ltd Stop - Highland - Cleveland - Cretin - Mpls")
        );
        assert_eq!(second.nodes.len(), 7);
        assert_eq!(second.nodes[3].attributes["ACCESS"], Value::from(-1));
        assert_eq!(second.nodes[5].attributes["NNTIME"], Value::from(1.5));
        assert_eq!(second.nodes[6].order, 7);
    }

    #[test]
    fn test_malformed_block_does_not_abort() {
        let source = r#"
LINE NAME="0_1-1_1_pk1", HEADWAY[1]=, NODES=1, 2
LINE NAME="0_2-1_2_pk1", HEADWAY[1]=15, NODES=3, -4, 5
LINE HEADWAY[1]=15, NODES=6, 7
"#;
        let parsed = parse_line_file(source);
        assert_eq!(parsed.lines.len(), 1);
        assert_eq!(parsed.lines[0].name.as_str(), "0_2-1_2_pk1");
        assert_eq!(parsed.diagnostics.len(), 2);
        assert_eq!(parsed.diagnostics[0].line_name.as_deref(), Some("0_1-1_1_pk1"));
        assert_eq!(parsed.diagnostics[0].line_number, 2);
    }

    #[test]
    fn test_pt_system_records() {
        let source = r#";;<<PT>><<LINE>>;;
OPERATOR NUMBER=3, NAME="Metro Transit", LONGNAME="Metro Transit"
MODE NUMBER=5, NAME="Local Bus"
LINE NAME="0_452-111_452_pk1", MODE=5, HEADWAY[1]=10, N=1, 2
"#;
        let parsed = parse_line_file(source);
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        assert_eq!(parsed.lines.len(), 1);
        let operator = parsed.pt_system.get(PtRecordKind::Operator, 3).unwrap();
        assert_eq!(operator["NAME"], Value::from("Metro Transit"));
        assert!(parsed.pt_system.get(PtRecordKind::Mode, 5).is_some());
    }

    #[test]
    fn test_line_attribute_after_nodes() {
        let parsed = parse_line_file("LINE NAME=\"a_1_1_pk1\", N=1, 2, 3, XYSPEED=20, RUNTIME=30");
        let line = &parsed.lines[0];
        assert_eq!(line.nodes.len(), 3);
        // XYSPEED inside a node list belongs to the node, RUNTIME ends the list
        assert_eq!(line.nodes[2].attributes["XYSPEED"], Value::from(20));
        assert_eq!(line.properties["RUNTIME"], Value::from(30));
    }

    #[test]
    fn test_normalize_attribute() {
        assert_eq!(normalize_attribute("usera2"), "USERA[2]");
        assert_eq!(normalize_attribute("headway[1]"), "HEADWAY[1]");
        assert_eq!(normalize_attribute("Mode"), "MODE");
    }
}
