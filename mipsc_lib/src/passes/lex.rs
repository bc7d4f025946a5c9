//! Lexical analysis: source text to a token stream.
//!
//! Single pass over the raw bytes with a 1-based line counter. All
//! lexical problems (stray characters, a lone `&`/`|`, unterminated
//! comments and strings) are code-`a` diagnostics; the lexer always
//! recovers and keeps going.

use crate::diagnostic::{AggregateResult, Code, Diagnostic};
use crate::token::{Token, TokenKind};

pub fn lex(source: &str) -> AggregateResult<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    lexer.run();
    AggregateResult::new(lexer.tokens, lexer.diagnostics)
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, kind: TokenKind, lexeme: impl Into<String>) {
        self.tokens.push(Token::new(kind, lexeme, self.line));
    }

    fn report(&mut self, line: u32, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::new(line, Code::IllegalSymbol, message));
    }

    fn run(&mut self) {
        while self.pos < self.chars.len() {
            self.skip_whitespace();
            let Some(c) = self.peek(0) else { break };
            match c {
                '/' => self.comment_or_div(),
                '"' => self.string(),
                c if c.is_ascii_alphabetic() || c == '_' => self.identifier(),
                c if c.is_ascii_digit() => self.number(),
                '&' | '|' | '<' | '>' | '=' | '!' => self.operator(),
                _ => self.single(),
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek(0) {
            if !c.is_whitespace() {
                break;
            }
            if c == '\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
    }

    fn comment_or_div(&mut self) {
        match self.peek(1) {
            Some('/') => {
                self.pos += 2;
                while let Some(c) = self.peek(0) {
                    if c == '\n' {
                        break;
                    }
                    self.pos += 1;
                }
            }
            Some('*') => {
                let start_line = self.line;
                self.pos += 2;
                loop {
                    match (self.peek(0), self.peek(1)) {
                        (Some('*'), Some('/')) => {
                            self.pos += 2;
                            return;
                        }
                        (Some(c), _) => {
                            if c == '\n' {
                                self.line += 1;
                            }
                            self.pos += 1;
                        }
                        (None, _) => {
                            self.report(start_line, "unterminated block comment");
                            return;
                        }
                    }
                }
            }
            _ => {
                self.push(TokenKind::Slash, "/");
                self.pos += 1;
            }
        }
    }

    fn string(&mut self) {
        let start_line = self.line;
        let mut lexeme = String::from('"');
        self.pos += 1;
        loop {
            match self.peek(0) {
                Some('\\') => {
                    if let Some(next) = self.peek(1) {
                        lexeme.push('\\');
                        lexeme.push(next);
                        self.pos += 2;
                    } else {
                        self.report(start_line, "unterminated string constant");
                        return;
                    }
                }
                Some('"') => {
                    lexeme.push('"');
                    self.pos += 1;
                    self.tokens
                        .push(Token::new(TokenKind::StrConst, lexeme, start_line));
                    return;
                }
                Some(c) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    lexeme.push(c);
                    self.pos += 1;
                }
                None => {
                    self.report(start_line, "unterminated string constant");
                    return;
                }
            }
        }
    }

    fn identifier(&mut self) {
        let mut lexeme = String::new();
        while let Some(c) = self.peek(0) {
            if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            lexeme.push(c);
            self.pos += 1;
        }
        let kind = match lexeme.as_str() {
            "const" => TokenKind::Const,
            "int" => TokenKind::Int,
            "static" => TokenKind::Static,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "return" => TokenKind::Return,
            "void" => TokenKind::Void,
            "main" => TokenKind::Main,
            "printf" => TokenKind::Printf,
            _ => TokenKind::Ident,
        };
        self.push(kind, lexeme);
    }

    fn number(&mut self) {
        let mut lexeme = String::new();
        while let Some(c) = self.peek(0) {
            if !c.is_ascii_digit() {
                break;
            }
            lexeme.push(c);
            self.pos += 1;
        }
        self.push(TokenKind::IntConst, lexeme);
    }

    fn operator(&mut self) {
        let c = self.peek(0).unwrap();
        let two: Option<TokenKind> = match (c, self.peek(1)) {
            ('&', Some('&')) => Some(TokenKind::AndAnd),
            ('|', Some('|')) => Some(TokenKind::OrOr),
            ('<', Some('=')) => Some(TokenKind::Le),
            ('>', Some('=')) => Some(TokenKind::Ge),
            ('=', Some('=')) => Some(TokenKind::Eq),
            ('!', Some('=')) => Some(TokenKind::Ne),
            _ => None,
        };
        if let Some(kind) = two {
            let lexeme: String = [c, self.peek(1).unwrap()].iter().collect();
            self.push(kind, lexeme);
            self.pos += 2;
            return;
        }
        match c {
            // `&` and `|` only exist doubled.
            '&' | '|' => {
                self.report(self.line, format!("illegal symbol `{c}`"));
                self.pos += 1;
            }
            '<' => {
                self.push(TokenKind::Lt, "<");
                self.pos += 1;
            }
            '>' => {
                self.push(TokenKind::Gt, ">");
                self.pos += 1;
            }
            '=' => {
                self.push(TokenKind::Assign, "=");
                self.pos += 1;
            }
            '!' => {
                self.push(TokenKind::Not, "!");
                self.pos += 1;
            }
            _ => unreachable!(),
        }
    }

    fn single(&mut self) {
        let c = self.peek(0).unwrap();
        let kind = match c {
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '%' => Some(TokenKind::Percent),
            ';' => Some(TokenKind::Semicolon),
            ',' => Some(TokenKind::Comma),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            _ => None,
        };
        match kind {
            Some(kind) => self.push(kind, c.to_string()),
            None => self.report(self.line, format!("illegal symbol `{c}`")),
        }
        self.pos += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_value().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("const int x static foo main"),
            [
                TokenKind::Const,
                TokenKind::Int,
                TokenKind::Ident,
                TokenKind::Static,
                TokenKind::Ident,
                TokenKind::Main,
            ]
        );
    }

    #[test]
    fn two_char_operators_win_over_single() {
        assert_eq!(
            kinds("<= < == = != ! >= >"),
            [
                TokenKind::Le,
                TokenKind::Lt,
                TokenKind::Eq,
                TokenKind::Assign,
                TokenKind::Ne,
                TokenKind::Not,
                TokenKind::Ge,
                TokenKind::Gt,
            ]
        );
    }

    #[test]
    fn lone_ampersand_is_diagnosed() {
        let res = lex("a && b\na & b\n");
        let diags: Vec<_> = res.diagnostics().collect();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line(), 2);
        assert_eq!(diags[0].code(), Code::IllegalSymbol);
    }

    #[test]
    fn comments_do_not_produce_tokens_but_count_lines() {
        let res = lex("// line comment\n/* multi\nline */ x");
        let tokens = res.into_value();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].lexeme, "x");
        assert_eq!(tokens[0].line, 3);
    }

    #[test]
    fn string_keeps_quotes_and_escapes_raw() {
        let res = lex("\"a\\nb\"");
        let tokens = res.into_value();
        assert_eq!(tokens[0].kind, TokenKind::StrConst);
        assert_eq!(tokens[0].lexeme, "\"a\\nb\"");
    }

    #[test]
    fn line_numbers_track_newlines() {
        let res = lex("a\nb\n\nc");
        let lines: Vec<u32> = res.into_value().iter().map(|t| t.line).collect();
        assert_eq!(lines, [1, 2, 4]);
    }
}
