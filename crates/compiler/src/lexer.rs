//! Tokenizer
//!
//! Turns script source into line-numbered tokens. Host-resolved directive
//! lines replace the matching source lines before they are scanned.

use crate::error::{Diagnostic, Result};
use gridscript_core::ScriptType;
use std::collections::BTreeMap;
use std::fmt;

/// Multi- and single-character operators, longest first so the first match
/// is the maximal munch.
pub const OPERATOR_SYMBOLS: &[&str] = &[
    "++", "--", "+=", "-=", "*=", "/=", "%=", "==", "!=", "<=", ">=", "&&", "||", "<<", ">>",
    "+", "-", "*", "/", "%", "<", ">", "=", "!", "~", "&", "|", "^", ".", "@",
];

/// Control keywords (type keywords lex as [`TokenKind::Type`])
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    For,
    While,
    Do,
    Jump,
    Return,
    State,
    Default,
    Break,
    Continue,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "for" => Keyword::For,
            "while" => Keyword::While,
            "do" => Keyword::Do,
            "jump" => Keyword::Jump,
            "return" => Keyword::Return,
            "state" => Keyword::State,
            "default" => Keyword::Default,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::For => "for",
            Keyword::While => "while",
            Keyword::Do => "do",
            Keyword::Jump => "jump",
            Keyword::Return => "return",
            Keyword::State => "state",
            Keyword::Default => "default",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Keyword(Keyword),
    /// Type keyword (`integer`, `vector`, ...)
    Type(ScriptType),
    Integer(i32),
    Float(f64),
    String(String),
    Operator(&'static str),

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Semicolon,
    Comma,
}

/// One lexeme with the source line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn is_op(&self, symbol: &str) -> bool {
        matches!(self.kind, TokenKind::Operator(op) if op == symbol)
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn script_type(&self) -> Option<ScriptType> {
        match self.kind {
            TokenKind::Type(ty) => Some(ty),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::String(_) => write!(f, "string literal {}", self.text),
            TokenKind::Integer(_) | TokenKind::Float(_) => write!(f, "number {}", self.text),
            _ => write!(f, "'{}'", self.text),
        }
    }
}

/// Source scanner
pub struct Lexer {
    chars: Vec<(char, usize)>,
    pos: usize,
    last_line: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self::with_directives(source, &BTreeMap::new())
    }

    /// Scanner over `source` where every line number in `directives` is
    /// replaced by the mapped text. Tokens from a replacement keep the
    /// replaced line's number.
    pub fn with_directives(source: &str, directives: &BTreeMap<usize, String>) -> Self {
        let mut chars = Vec::with_capacity(source.len() + 1);
        let mut last_line = 1;
        for (index, text) in source.split('\n').enumerate() {
            let line = index + 1;
            let text = directives.get(&line).map(String::as_str).unwrap_or(text);
            chars.extend(text.chars().map(|c| (c, line)));
            chars.push(('\n', line));
            last_line = line;
        }
        Self {
            chars,
            pos: 0,
            last_line,
        }
    }

    /// Line number of the final source line
    pub fn last_line(&self) -> usize {
        self.last_line
    }

    /// Scan every remaining token
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    /// Next token, or `None` at end of input
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_trivia()?;

        let Some((ch, line)) = self.peek() else {
            return Ok(None);
        };

        let token = match ch {
            '0'..='9' => self.read_number(line)?,
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number(line)?,
            'a'..='z' | 'A'..='Z' | '_' => self.read_word(line),
            '"' => self.read_string(line)?,
            '(' | ')' | '[' | ']' | '{' | '}' | ';' | ',' => {
                self.pos += 1;
                let kind = match ch {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    '{' => TokenKind::LBrace,
                    '}' => TokenKind::RBrace,
                    ';' => TokenKind::Semicolon,
                    _ => TokenKind::Comma,
                };
                Token {
                    kind,
                    text: ch.to_string(),
                    line,
                }
            }
            _ => self.read_operator(ch, line)?,
        };
        Ok(Some(token))
    }

    fn peek(&self) -> Option<(char, usize)> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|(c, _)| *c)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        while let Some((ch, line)) = self.peek() {
            if ch.is_whitespace() {
                self.pos += 1;
            } else if ch == '/' && self.peek_at(1) == Some('/') {
                while self.peek().is_some_and(|(c, _)| c != '\n') {
                    self.pos += 1;
                }
            } else if ch == '/' && self.peek_at(1) == Some('*') {
                self.pos += 2;
                loop {
                    match self.peek() {
                        None => return Err(Diagnostic::lexical(line, "unterminated block comment")),
                        Some(('*', _)) if self.peek_at(1) == Some('/') => {
                            self.pos += 2;
                            break;
                        }
                        Some(_) => self.pos += 1,
                    }
                }
            } else {
                break;
            }
        }
        Ok(())
    }

    fn take_while(&mut self, text: &mut String, pred: impl Fn(char) -> bool) {
        while let Some((c, _)) = self.peek() {
            if !pred(c) {
                break;
            }
            text.push(c);
            self.pos += 1;
        }
    }

    fn read_number(&mut self, line: usize) -> Result<Token> {
        let mut text = String::new();

        if self.peek_at(0) == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            text.push_str("0x");
            self.pos += 2;
            let mut digits = String::new();
            self.take_while(&mut digits, |c| c.is_ascii_hexdigit());
            text.push_str(&digits);
            self.reject_suffix(&text, line)?;
            if digits.is_empty() {
                return Err(Diagnostic::lexical(line, format!("malformed hexadecimal literal '{}'", text)));
            }
            let value = u64::from_str_radix(&digits, 16).unwrap_or(u64::MAX).min(u32::MAX as u64);
            return Ok(Token {
                kind: TokenKind::Integer(value as u32 as i32),
                text,
                line,
            });
        }

        let mut is_float = false;
        self.take_while(&mut text, |c| c.is_ascii_digit());
        if self.peek_at(0) == Some('.') {
            is_float = true;
            text.push('.');
            self.pos += 1;
            self.take_while(&mut text, |c| c.is_ascii_digit());
        }
        if matches!(self.peek_at(0), Some('e' | 'E')) {
            is_float = true;
            text.push('e');
            self.pos += 1;
            if let Some(sign @ ('+' | '-')) = self.peek_at(0) {
                text.push(sign);
                self.pos += 1;
            }
            let before = text.len();
            self.take_while(&mut text, |c| c.is_ascii_digit());
            if text.len() == before {
                return Err(Diagnostic::lexical(line, format!("malformed exponent in '{}'", text)));
            }
        }
        if matches!(self.peek_at(0), Some('f' | 'F')) {
            is_float = true;
            self.pos += 1;
        }
        self.reject_suffix(&text, line)?;

        let kind = if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| Diagnostic::lexical(line, format!("malformed float literal '{}'", text)))?;
            TokenKind::Float(value)
        } else {
            // Out-of-range literals saturate to 0xFFFFFFFF, then wrap like the host.
            let value = text.parse::<u64>().unwrap_or(u64::MAX).min(u32::MAX as u64);
            TokenKind::Integer(value as u32 as i32)
        };
        Ok(Token { kind, text, line })
    }

    fn reject_suffix(&mut self, text: &str, line: usize) -> Result<()> {
        match self.peek_at(0) {
            Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                let mut rest = text.to_string();
                self.take_while(&mut rest, |c| c.is_ascii_alphanumeric() || c == '_');
                Err(Diagnostic::lexical(line, format!("malformed numeric literal '{}'", rest)))
            }
            _ => Ok(()),
        }
    }

    fn read_word(&mut self, line: usize) -> Token {
        let mut text = String::new();
        self.take_while(&mut text, |c| c.is_ascii_alphanumeric() || c == '_');

        let kind = if let Some(ty) = ScriptType::from_keyword(&text) {
            TokenKind::Type(ty)
        } else if let Some(keyword) = Keyword::from_word(&text) {
            TokenKind::Keyword(keyword)
        } else {
            TokenKind::Identifier(text.clone())
        };
        Token { kind, text, line }
    }

    fn read_string(&mut self, line: usize) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;

        let mut value = String::new();
        loop {
            let Some((ch, _)) = self.peek() else {
                return Err(Diagnostic::lexical(line, "unterminated string literal"));
            };
            self.pos += 1;
            match ch {
                '"' => break,
                '\\' => {
                    let Some((escaped, _)) = self.peek() else {
                        return Err(Diagnostic::lexical(line, "unterminated string literal"));
                    };
                    self.pos += 1;
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                }
                _ => value.push(ch),
            }
        }

        let text = self.chars[start..self.pos].iter().map(|(c, _)| *c).collect();
        Ok(Token {
            kind: TokenKind::String(value),
            text,
            line,
        })
    }

    fn read_operator(&mut self, ch: char, line: usize) -> Result<Token> {
        for symbol in OPERATOR_SYMBOLS {
            let matched = symbol
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_at(i) == Some(c));
            if matched {
                self.pos += symbol.chars().count();
                return Ok(Token {
                    kind: TokenKind::Operator(symbol),
                    text: symbol.to_string(),
                    line,
                });
            }
        }
        Err(Diagnostic::lexical(line, format!("unexpected character '{}'", ch)))
    }
}

/// Tokenize `source` with host-resolved directive lines applied
pub fn tokenize(source: &str, directives: &BTreeMap<usize, String>) -> Result<Vec<Token>> {
    Lexer::with_directives(source, directives).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_wide_integer_literals_saturate() {
        assert_eq!(
            kinds("4294967295 4294967296 99999999999999999999 0x100000000 0x123456789ABCDEF0123"),
            vec![TokenKind::Integer(-1); 5]
        );
        assert!(Lexer::new("0x").tokenize().unwrap_err().message.contains("malformed hexadecimal"));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 0x1F 0xFFFFFFFF 1.5 1. .5 1e3 2.5e-1 3f"),
            vec![
                TokenKind::Integer(42),
                TokenKind::Integer(31),
                TokenKind::Integer(-1),
                TokenKind::Float(1.5),
                TokenKind::Float(1.0),
                TokenKind::Float(0.5),
                TokenKind::Float(1000.0),
                TokenKind::Float(0.25),
                TokenKind::Float(3.0),
            ]
        );
    }

    #[test]
    fn test_keywords_and_types() {
        assert_eq!(
            kinds("integer quaternion if jump counter"),
            vec![
                TokenKind::Type(ScriptType::Integer),
                TokenKind::Type(ScriptType::Rotation),
                TokenKind::Keyword(Keyword::If),
                TokenKind::Keyword(Keyword::Jump),
                TokenKind::Identifier("counter".into()),
            ]
        );
    }

    #[test]
    fn test_maximal_munch() {
        assert_eq!(
            kinds("a+++b <<= c"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Operator("++"),
                TokenKind::Operator("+"),
                TokenKind::Identifier("b".into()),
                TokenKind::Operator("<<"),
                TokenKind::Operator("="),
                TokenKind::Identifier("c".into()),
            ]
        );
    }

    #[test]
    fn test_member_access_is_not_a_float() {
        assert_eq!(
            kinds("v.x"),
            vec![
                TokenKind::Identifier("v".into()),
                TokenKind::Operator("."),
                TokenKind::Identifier("x".into()),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\\c\nd\q""#),
            vec![TokenKind::String("a\"b\\c\ndq".into())]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = Lexer::new("a // one\n/* two\nthree */ b\n\nc").tokenize().unwrap();
        let lines: Vec<usize> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 3, 5]);
    }

    #[test]
    fn test_directive_replacement() {
        let mut directives = BTreeMap::new();
        directives.insert(2, "integer injected;".to_string());
        let tokens = tokenize("a;\n#include \"x\"\nb;", &directives).unwrap();

        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", ";", "integer", "injected", ";", "b", ";"]);
        assert_eq!(tokens[2].line, 2);
        assert_eq!(tokens[5].line, 3);
    }

    #[test]
    fn test_lexical_errors() {
        let err = Lexer::new("x = \"open").tokenize().unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Lexical);
        assert!(err.message.contains("unterminated string"));

        let err = Lexer::new("\n/* never closed").tokenize().unwrap_err();
        assert_eq!(err.line, 2);

        let err = Lexer::new("12ab").tokenize().unwrap_err();
        assert!(err.message.contains("12ab"));

        let err = Lexer::new("1e+").tokenize().unwrap_err();
        assert!(err.message.contains("exponent"));

        let err = Lexer::new("a $ b").tokenize().unwrap_err();
        assert!(err.message.contains('$'));
    }
}
