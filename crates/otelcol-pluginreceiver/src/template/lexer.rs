//! Template lexer
//!
//! Splits a template into text and action tokens. Trim markers (`{{- ` and
//! ` -}}`) are applied here and comments are dropped, so the parser never
//! sees either.

use super::TemplateError;

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";
const TRIM_MARKER: char = '-';

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Text(String),
    LeftDelim,
    RightDelim,
    Space,
    /// Keyword, function name, `true`, `false` or `nil`
    Identifier(String),
    /// `.name`, stored without the dot
    Field(String),
    Dot,
    /// `$` or `$name`, stored with the dollar sign
    Variable(String),
    Str(String),
    Number(String),
    LeftParen,
    RightParen,
    Pipe,
    Declare,
    Assign,
    Comma,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Item {
    pub token: Token,
    pub line: usize,
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_alphanumeric(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

struct Lexer<'a> {
    name: &'a str,
    src: &'a str,
    pos: usize,
    line: usize,
    items: Vec<Item>,
}

impl<'a> Lexer<'a> {
    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::syntax(self.name, self.line, message)
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn emit(&mut self, token: Token, line: usize) {
        self.items.push(Item { token, line });
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(is_space) {
            self.bump();
        }
    }

    /// A right trim marker: spaces, then `-}}`
    fn at_trimmed_right_delim(&self) -> bool {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches(is_space);
        trimmed.len() < rest.len() && trimmed.starts_with("-}}")
    }

    fn run(mut self) -> Result<Vec<Item>, TemplateError> {
        while self.pos < self.src.len() {
            self.lex_text()?;
        }
        let line = self.line;
        self.emit(Token::Eof, line);
        Ok(self.items)
    }

    fn lex_text(&mut self) -> Result<(), TemplateError> {
        let rest = self.rest();
        let Some(offset) = rest.find(LEFT_DELIM) else {
            let line = self.line;
            let text = rest.to_string();
            while self.bump().is_some() {}
            self.emit(Token::Text(text), line);
            return Ok(());
        };

        let after = &rest[offset + LEFT_DELIM.len()..];
        let mut chars = after.chars();
        let trim_left = chars.next() == Some(TRIM_MARKER) && chars.next().is_some_and(is_space);

        let mut text = &rest[..offset];
        if trim_left {
            text = text.trim_end_matches(is_space);
        }
        if !text.is_empty() {
            let line = self.line;
            self.emit(Token::Text(text.to_string()), line);
        }
        for _ in rest[..offset].chars() {
            self.bump();
        }
        self.pos += LEFT_DELIM.len();
        if trim_left {
            self.bump();
            self.skip_spaces();
        }

        if self.rest().starts_with("/*") {
            return self.lex_comment();
        }

        let line = self.line;
        self.emit(Token::LeftDelim, line);
        self.lex_action()
    }

    fn lex_comment(&mut self) -> Result<(), TemplateError> {
        let Some(end) = self.rest().find("*/") else {
            return Err(self.error("unclosed comment"));
        };
        let comment = &self.rest()[..end + 2];
        for _ in comment.chars() {
            self.bump();
        }
        let trim_right = if self.rest().starts_with(RIGHT_DELIM) {
            false
        } else if self.at_trimmed_right_delim() {
            self.skip_spaces();
            self.bump();
            true
        } else {
            return Err(self.error("comment ends before closing delimiter"));
        };
        self.pos += RIGHT_DELIM.len();
        if trim_right {
            self.skip_spaces();
        }
        Ok(())
    }

    fn lex_action(&mut self) -> Result<(), TemplateError> {
        loop {
            let line = self.line;
            if self.at_trimmed_right_delim() {
                self.skip_spaces();
                self.bump();
                self.pos += RIGHT_DELIM.len();
                self.emit(Token::RightDelim, line);
                self.skip_spaces();
                return Ok(());
            }
            if self.rest().starts_with(RIGHT_DELIM) {
                self.pos += RIGHT_DELIM.len();
                self.emit(Token::RightDelim, line);
                return Ok(());
            }

            let Some(c) = self.peek() else {
                return Err(self.error("unclosed action"));
            };
            match c {
                c if is_space(c) => {
                    self.skip_spaces();
                    self.emit(Token::Space, line);
                }
                '(' => {
                    self.bump();
                    self.emit(Token::LeftParen, line);
                }
                ')' => {
                    self.bump();
                    self.emit(Token::RightParen, line);
                }
                '|' => {
                    self.bump();
                    self.emit(Token::Pipe, line);
                }
                ',' => {
                    self.bump();
                    self.emit(Token::Comma, line);
                }
                ':' => {
                    self.bump();
                    if self.bump() != Some('=') {
                        return Err(self.error("expected :="));
                    }
                    self.emit(Token::Declare, line);
                }
                '=' => {
                    self.bump();
                    self.emit(Token::Assign, line);
                }
                '"' => {
                    let s = self.lex_quote()?;
                    self.emit(Token::Str(s), line);
                }
                '`' => {
                    let s = self.lex_raw_quote()?;
                    self.emit(Token::Str(s), line);
                }
                '\'' => {
                    let n = self.lex_char()?;
                    self.emit(Token::Number(n), line);
                }
                '$' => {
                    self.bump();
                    let name = self.take_word();
                    self.emit(Token::Variable(format!("${}", name)), line);
                }
                '.' => {
                    if self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
                        let n = self.lex_number();
                        self.emit(Token::Number(n), line);
                    } else {
                        self.bump();
                        let name = self.take_word();
                        if name.is_empty() {
                            self.emit(Token::Dot, line);
                        } else {
                            self.emit(Token::Field(name), line);
                        }
                    }
                }
                '+' | '-' | '0'..='9' => {
                    let n = self.lex_number();
                    self.emit(Token::Number(n), line);
                }
                c if is_alphanumeric(c) => {
                    let word = self.take_word();
                    self.emit(Token::Identifier(word), line);
                }
                other => {
                    return Err(self.error(format!("unexpected {:?} in command", other)));
                }
            }
        }
    }

    fn take_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek().filter(|c| is_alphanumeric(*c)) {
            word.push(c);
            self.bump();
        }
        word
    }

    fn lex_number(&mut self) -> String {
        let mut number = String::new();
        if let Some(sign) = self.peek().filter(|c| matches!(c, '+' | '-')) {
            number.push(sign);
            self.bump();
        }
        let mut prev = ' ';
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '+' | '-') && matches!(prev, 'e' | 'E' | 'p' | 'P');
            if !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign) {
                break;
            }
            number.push(c);
            prev = c;
            self.bump();
        }
        number
    }

    fn lex_quote(&mut self) -> Result<String, TemplateError> {
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unterminated quoted string")),
                Some('"') => return Ok(s),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some('0') => '\0',
                        Some(other) => {
                            return Err(self.error(format!("unknown escape sequence \\{}", other)))
                        }
                        None => return Err(self.error("unterminated quoted string")),
                    };
                    s.push(escaped);
                }
                Some(c) => s.push(c),
            }
        }
    }

    fn lex_raw_quote(&mut self) -> Result<String, TemplateError> {
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated raw quoted string")),
                Some('`') => return Ok(s),
                Some(c) => s.push(c),
            }
        }
    }

    fn lex_char(&mut self) -> Result<String, TemplateError> {
        self.bump();
        let c = match self.bump() {
            Some('\\') => match self.bump() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('\\') => '\\',
                Some('\'') => '\'',
                _ => return Err(self.error("bad character constant")),
            },
            Some(c) if c != '\'' => c,
            _ => return Err(self.error("bad character constant")),
        };
        if self.bump() != Some('\'') {
            return Err(self.error("unterminated character constant"));
        }
        Ok((c as u32).to_string())
    }
}

/// Tokenize `src`; errors carry the template `name`
pub(crate) fn lex(name: &str, src: &str) -> Result<Vec<Item>, TemplateError> {
    Lexer {
        name,
        src,
        pos: 0,
        line: 1,
        items: Vec::new(),
    }
    .run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        lex("t", src).unwrap().into_iter().map(|i| i.token).collect()
    }

    #[test]
    fn test_text_and_action() {
        assert_eq!(
            tokens("a {{ .b }} c"),
            vec![
                Token::Text("a ".into()),
                Token::LeftDelim,
                Token::Space,
                Token::Field("b".into()),
                Token::Space,
                Token::RightDelim,
                Token::Text(" c".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_trim_markers() {
        assert_eq!(
            tokens("a  \n{{- .b -}}\n  c"),
            vec![
                Token::Text("a".into()),
                Token::LeftDelim,
                Token::Field("b".into()),
                Token::RightDelim,
                Token::Text("c".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_negative_number_is_not_trim() {
        assert_eq!(
            tokens("{{-3}}"),
            vec![
                Token::LeftDelim,
                Token::Number("-3".into()),
                Token::RightDelim,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comment_dropped() {
        assert_eq!(
            tokens("a {{- /* note\nmore */ -}} b"),
            vec![Token::Text("a".into()), Token::Text("b".into()), Token::Eof]
        );
    }

    #[test]
    fn test_variables_and_chains() {
        assert_eq!(
            tokens("{{$x := $.a.b}}"),
            vec![
                Token::LeftDelim,
                Token::Variable("$x".into()),
                Token::Space,
                Token::Declare,
                Token::Space,
                Token::Variable("$".into()),
                Token::Field("a".into()),
                Token::Field("b".into()),
                Token::RightDelim,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_line_numbers() {
        let items = lex("t", "one\ntwo\n{{ .x }}").unwrap();
        let delim = items.iter().find(|i| i.token == Token::LeftDelim).unwrap();
        assert_eq!(delim.line, 3);
    }

    #[test]
    fn test_unclosed_action() {
        let err = lex("t", "{{ .a ").unwrap_err();
        assert!(err.is_syntax());
    }
}
