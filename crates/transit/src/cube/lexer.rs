//! Tokenizer for Cube line files.
//!
//! `;` starts a comment running to the end of the line, except for the
//! `;;<<PT>><<LINE>>;;` program header which becomes its own token.

use crate::models::types::ProgramType;

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    /// Program header such as `;;<<PT>><<LINE>>;;`
    Header(ProgramType),
    /// Keyword, attribute name or bare value (`LINE`, `HEADWAY[1]`, `T`)
    Word(String),
    /// Quoted string with the quotes removed
    Str(String),
    /// Signed integer or decimal, as written
    Number(String),
    Equals,
    Comma,
    /// Anything else; the parser reports it
    Unexpected(char),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based source line
    pub line: usize,
}

/// A lexing problem that stops tokenization (an unterminated string).
#[derive(Clone, Debug, PartialEq)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    source: &'a str,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.char_indices().peekable(),
            source,
            line: 1,
        }
    }

    /// Tokenize the whole source. Tokens read before an error are kept.
    pub fn tokenize(mut self) -> (Vec<Token>, Option<LexError>) {
        let mut tokens = Vec::new();
        loop {
            match self.next_token() {
                Ok(Some(token)) => tokens.push(token),
                Ok(None) => return (tokens, None),
                Err(err) => return (tokens, Some(err)),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        loop {
            let Some(&(pos, c)) = self.chars.peek() else {
                return Ok(None);
            };

            match c {
                '\n' => {
                    self.line += 1;
                    self.chars.next();
                }
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                ';' => {
                    if let Some(program) = self.header_at(pos) {
                        return Ok(Some(self.token(TokenKind::Header(program))));
                    }
                    self.skip_comment();
                }
                '=' => {
                    self.chars.next();
                    return Ok(Some(self.token(TokenKind::Equals)));
                }
                ',' => {
                    self.chars.next();
                    return Ok(Some(self.token(TokenKind::Comma)));
                }
                '"' | '\'' => return self.string(c).map(Some),
                '-' | '+' | '0'..='9' | '.' => return Ok(Some(self.number())),
                c if c.is_alphabetic() || c == '_' => return Ok(Some(self.word())),
                other => {
                    self.chars.next();
                    return Ok(Some(self.token(TokenKind::Unexpected(other))));
                }
            }
        }
    }

    fn token(&self, kind: TokenKind) -> Token {
        Token {
            kind,
            line: self.line,
        }
    }

    /// Consume a `;;<<PROGRAM>><<LINE>>;;` header if one starts at `pos`.
    fn header_at(&mut self, pos: usize) -> Option<ProgramType> {
        let rest = &self.source[pos..];
        let body = rest.strip_prefix(";;<<")?;
        let close = body.find(">><<LINE>>;;")?;
        let program = ProgramType::from_header(&body[..close])?;

        let consumed = ";;<<".len() + close + ">><<LINE>>;;".len();
        let end = pos + consumed;
        while matches!(self.chars.peek(), Some(&(i, _)) if i < end) {
            self.chars.next();
        }
        Some(program)
    }

    fn skip_comment(&mut self) {
        while matches!(self.chars.peek(), Some(&(_, c)) if c != '\n') {
            self.chars.next();
        }
    }

    fn string(&mut self, quote: char) -> Result<Token, LexError> {
        let start_line = self.line;
        self.chars.next();
        let mut value = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == quote {
                return Ok(Token {
                    kind: TokenKind::Str(value),
                    line: start_line,
                });
            }
            if c == '\n' {
                self.line += 1;
            }
            value.push(c);
        }
        Err(LexError {
            line: start_line,
            message: "unterminated string".to_string(),
        })
    }

    fn number(&mut self) -> Token {
        let mut text = String::new();
        if let Some(&(_, sign @ ('-' | '+'))) = self.chars.peek() {
            text.push(sign);
            self.chars.next();
        }
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if text.chars().any(|c| c.is_ascii_digit()) {
            self.token(TokenKind::Number(text))
        } else {
            self.token(TokenKind::Word(text))
        }
    }

    fn word(&mut self) -> Token {
        let mut text = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '[' | ']') {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        self.token(TokenKind::Word(text))
    }
}
