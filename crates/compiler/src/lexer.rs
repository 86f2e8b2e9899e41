//! Scanner for MiniC source
//!
//! Hand-written character walk producing a flat token stream with line
//! numbers. The scanner is context-free: whether an identifier is a typedef
//! name is decided later against the symbol table.
//!
//! Preprocessor handling is deliberately thin: `#include <header>` becomes
//! an [`TokenKind::Include`] token carrying the header name (the parser uses
//! it to pre-register library functions); every other `#` line is skipped.

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Keyword,
    IntLit,
    HexLit,
    OctalLit,
    BinaryLit,
    FloatLit,
    CharLit,
    StringLit,
    Punct,
    /// `#include <...>`; text is the bare header name.
    Include,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-indexed source line.
    pub line: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
        }
    }

    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }
}

const KEYWORDS: &[&str] = &[
    "if", "else", "while", "for", "do", "until", "switch", "case", "default", "break", "continue",
    "return", "goto", "sizeof", "typedef", "static", "extern", "auto", "register", "const",
    "volatile", "struct", "union", "enum", "void", "char", "short", "int", "long", "float",
    "double", "signed", "unsigned",
];

pub fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

/// Multi-character operators, longest first so maximal munch works by
/// simple prefix testing.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=",
    "*=", "/=", "%=", "&=", "|=", "^=",
];

/// Scan the whole translation unit. Fails only on malformed lexical input
/// (unterminated literal or comment, stray byte).
pub fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while pos < chars.len() {
        let c = chars[pos];

        if c == '\n' {
            line += 1;
            pos += 1;
            continue;
        }
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        // Comments
        if c == '/' && chars.get(pos + 1) == Some(&'/') {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }
        if c == '/' && chars.get(pos + 1) == Some(&'*') {
            let start_line = line;
            pos += 2;
            loop {
                if pos >= chars.len() {
                    return Err(format!("Unterminated comment starting on line {}", start_line));
                }
                if chars[pos] == '\n' {
                    line += 1;
                }
                if chars[pos] == '*' && chars.get(pos + 1) == Some(&'/') {
                    pos += 2;
                    break;
                }
                pos += 1;
            }
            continue;
        }

        // Preprocessor lines
        if c == '#' {
            let line_start = pos;
            let mut end = pos;
            while end < chars.len() && chars[end] != '\n' {
                end += 1;
            }
            let directive: String = chars[line_start..end].iter().collect();
            if let Some(header) = parse_include(&directive) {
                tokens.push(Token::new(TokenKind::Include, header, line));
            }
            pos = end;
            continue;
        }

        // Identifiers and keywords
        if c.is_ascii_alphabetic() || c == '_' {
            let start = pos;
            while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let text: String = chars[start..pos].iter().collect();
            let kind = if is_keyword(&text) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            tokens.push(Token::new(kind, text, line));
            continue;
        }

        // Numbers
        if c.is_ascii_digit() {
            let start = pos;
            if c == '0' && matches!(chars.get(pos + 1), Some(&('x' | 'X'))) {
                pos += 2;
                while pos < chars.len() && chars[pos].is_ascii_hexdigit() {
                    pos += 1;
                }
                let text: String = chars[start..pos].iter().collect();
                tokens.push(Token::new(TokenKind::HexLit, text, line));
                continue;
            }
            if c == '0' && matches!(chars.get(pos + 1), Some(&('b' | 'B'))) {
                pos += 2;
                while pos < chars.len() && matches!(chars[pos], '0' | '1') {
                    pos += 1;
                }
                let text: String = chars[start..pos].iter().collect();
                tokens.push(Token::new(TokenKind::BinaryLit, text, line));
                continue;
            }
            let mut is_float = false;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if chars.get(pos) == Some(&'.') && chars.get(pos + 1).is_some_and(|d| d.is_ascii_digit())
            {
                is_float = true;
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            if matches!(chars.get(pos), Some(&('e' | 'E'))) {
                let mut look = pos + 1;
                if matches!(chars.get(look), Some(&('+' | '-'))) {
                    look += 1;
                }
                if chars.get(look).is_some_and(|d| d.is_ascii_digit()) {
                    is_float = true;
                    pos = look;
                    while pos < chars.len() && chars[pos].is_ascii_digit() {
                        pos += 1;
                    }
                }
            }
            let text: String = chars[start..pos].iter().collect();
            let kind = if is_float {
                TokenKind::FloatLit
            } else if text.len() > 1 && text.starts_with('0') {
                TokenKind::OctalLit
            } else {
                TokenKind::IntLit
            };
            tokens.push(Token::new(kind, text, line));
            continue;
        }

        // Character literal, quotes kept in the token text
        if c == '\'' {
            let start = pos;
            pos += 1;
            while pos < chars.len() && chars[pos] != '\'' {
                if chars[pos] == '\\' {
                    pos += 1;
                }
                pos += 1;
            }
            if pos >= chars.len() {
                return Err(format!("Unterminated character literal on line {}", line));
            }
            pos += 1; // closing quote
            let text: String = chars[start..pos].iter().collect();
            tokens.push(Token::new(TokenKind::CharLit, text, line));
            continue;
        }

        // String literal, quotes kept in the token text
        if c == '"' {
            let start = pos;
            let start_line = line;
            pos += 1;
            while pos < chars.len() && chars[pos] != '"' {
                if chars[pos] == '\\' {
                    pos += 1;
                }
                if chars.get(pos) == Some(&'\n') {
                    line += 1;
                }
                pos += 1;
            }
            if pos >= chars.len() {
                return Err(format!("Unterminated string literal on line {}", start_line));
            }
            pos += 1;
            let text: String = chars[start..pos].iter().collect();
            tokens.push(Token::new(TokenKind::StringLit, text, start_line));
            continue;
        }

        // Multi-character operators, longest match first
        if let Some(op) = OPERATORS.iter().find(|op| {
            op.chars()
                .enumerate()
                .all(|(i, oc)| chars.get(pos + i) == Some(&oc))
        }) {
            tokens.push(Token::new(TokenKind::Punct, *op, line));
            pos += op.len();
            continue;
        }

        // Single-character punctuation
        if "+-*/%<>=!&|^~?:;,.(){}[]".contains(c) {
            tokens.push(Token::new(TokenKind::Punct, c.to_string(), line));
            pos += 1;
            continue;
        }

        return Err(format!("Unexpected character '{}' on line {}", c, line));
    }

    Ok(tokens)
}

/// Extract the header name from `#include <name>` / `#include "name"`.
fn parse_include(directive: &str) -> Option<String> {
    let rest = directive.trim_start_matches('#').trim_start();
    let rest = rest.strip_prefix("include")?.trim_start();
    if let Some(inner) = rest.strip_prefix('<') {
        let end = inner.find('>')?;
        return Some(inner[..end].trim().to_string());
    }
    if let Some(inner) = rest.strip_prefix('"') {
        let end = inner.find('"')?;
        return Some(inner[..end].trim().to_string());
    }
    None
}
