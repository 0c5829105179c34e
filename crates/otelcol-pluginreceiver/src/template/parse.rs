//! Template parser
//!
//! Builds the node tree of a template from its tokens. Function names and
//! variables are resolved here, so an unknown function or an undeclared
//! variable is a syntax error rather than an execution error.

use super::funcs;
use super::lexer::{lex, Item, Token};
use super::TemplateError;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Action(Pipeline),
    If(Branch),
    With(Branch),
    Range(Branch),
    Template {
        line: usize,
        name: String,
        pipe: Option<Pipeline>,
    },
    Break,
    Continue,
}

/// Body of `if`, `with` and `range`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Branch {
    pub pipe: Pipeline,
    pub list: Vec<Node>,
    pub else_list: Option<Vec<Node>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub line: usize,
    /// Variables declared or assigned by the pipeline
    pub decl: Vec<String>,
    /// `=` rather than `:=`
    pub is_assign: bool,
    pub cmds: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Arg {
    Dot,
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// `.a.b`
    Field(Vec<String>),
    /// `$x.a.b`
    Variable(String, Vec<String>),
    /// `(pipeline).a.b`
    Chain(Box<Arg>, Vec<String>),
    Pipe(Box<Pipeline>),
    Function(String),
}

impl std::fmt::Display for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Dot => write!(f, "."),
            Arg::Nil => write!(f, "nil"),
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Int(i) => write!(f, "{}", i),
            Arg::Float(x) => write!(f, "{}", x),
            Arg::Str(s) => write!(f, "{:?}", s),
            Arg::Field(fields) => write!(f, ".{}", fields.join(".")),
            Arg::Variable(name, fields) if fields.is_empty() => write!(f, "{}", name),
            Arg::Variable(name, fields) => write!(f, "{}.{}", name, fields.join(".")),
            Arg::Chain(inner, fields) => write!(f, "{}.{}", inner, fields.join(".")),
            Arg::Pipe(_) => write!(f, "(...)"),
            Arg::Function(name) => write!(f, "{}", name),
        }
    }
}

/// A parsed template and the templates it defines
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tree {
    pub root: Vec<Node>,
    pub defines: HashMap<String, Vec<Node>>,
}

/// How a list of nodes ended
#[derive(Debug, PartialEq)]
enum End {
    Eof,
    End,
    Else,
}

struct Parser<'a> {
    name: &'a str,
    items: Vec<Item>,
    pos: usize,
    vars: Vec<String>,
    range_depth: usize,
    defines: HashMap<String, Vec<Node>>,
}

pub(crate) fn parse(name: &str, src: &str) -> Result<Tree, TemplateError> {
    let items = lex(name, src)?;
    let mut parser = Parser {
        name,
        items,
        pos: 0,
        vars: vec!["$".to_string()],
        range_depth: 0,
        defines: HashMap::new(),
    };
    let (root, end) = parser.parse_list(true)?;
    if end != End::Eof {
        return Err(parser.error(format!("unexpected {{{{{:?}}}}}", end).to_lowercase()));
    }
    Ok(Tree {
        root,
        defines: parser.defines,
    })
}

impl<'a> Parser<'a> {
    fn line(&self) -> usize {
        self.items
            .get(self.pos)
            .or_else(|| self.items.last())
            .map_or(1, |item| item.line)
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::syntax(self.name, self.line(), message)
    }

    fn peek(&self) -> &Token {
        self.items
            .get(self.pos)
            .map_or(&Token::Eof, |item| &item.token)
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.items.len() {
            self.pos += 1;
        }
        token
    }

    fn skip_spaces(&mut self) {
        while *self.peek() == Token::Space {
            self.pos += 1;
        }
    }

    /// Next token that is not a space
    fn next_non_space(&mut self) -> Token {
        self.skip_spaces();
        self.next()
    }

    fn expect_right_delim(&mut self, context: &str) -> Result<(), TemplateError> {
        match self.next_non_space() {
            Token::RightDelim => Ok(()),
            other => Err(self.error(format!("unexpected {:?} in {}", other, context))),
        }
    }

    fn parse_list(&mut self, top_level: bool) -> Result<(Vec<Node>, End), TemplateError> {
        let mut nodes = Vec::new();
        loop {
            match self.next() {
                Token::Eof => return Ok((nodes, End::Eof)),
                Token::Text(text) => nodes.push(Node::Text(text)),
                Token::LeftDelim => {
                    self.skip_spaces();
                    let keyword = match self.peek() {
                        Token::Identifier(word) => word.clone(),
                        _ => String::new(),
                    };
                    match keyword.as_str() {
                        "end" => {
                            self.pos += 1;
                            self.expect_right_delim("end")?;
                            return Ok((nodes, End::End));
                        }
                        "else" => {
                            self.pos += 1;
                            return Ok((nodes, End::Else));
                        }
                        "if" | "with" | "range" => {
                            self.pos += 1;
                            nodes.push(self.parse_control(&keyword)?);
                        }
                        "define" => {
                            if !top_level {
                                return Err(self.error("unexpected <define> in command"));
                            }
                            self.pos += 1;
                            self.parse_define()?;
                        }
                        "block" => {
                            self.pos += 1;
                            nodes.push(self.parse_block()?);
                        }
                        "template" => {
                            self.pos += 1;
                            nodes.push(self.parse_template()?);
                        }
                        "break" | "continue" => {
                            if self.range_depth == 0 {
                                return Err(self.error(format!(
                                    "{{{{{}}}}} outside {{{{range}}}}",
                                    keyword
                                )));
                            }
                            self.pos += 1;
                            self.expect_right_delim(&keyword)?;
                            nodes.push(if keyword == "break" {
                                Node::Break
                            } else {
                                Node::Continue
                            });
                        }
                        _ => {
                            let pipe = self.parse_pipeline("command", true, false)?;
                            nodes.push(Node::Action(pipe));
                        }
                    }
                }
                other => return Err(self.error(format!("unexpected {:?}", other))),
            }
        }
    }

    fn parse_control(&mut self, keyword: &str) -> Result<Node, TemplateError> {
        let mark = self.vars.len();
        let is_range = keyword == "range";
        let pipe = self.parse_pipeline(keyword, true, is_range)?;

        if is_range {
            self.range_depth += 1;
        }
        let (list, end) = self.parse_list(false)?;
        if is_range {
            self.range_depth -= 1;
        }

        let else_list = match end {
            End::Eof => return Err(self.error(format!("unexpected EOF in {}", keyword))),
            End::End => None,
            End::Else => {
                self.skip_spaces();
                let chained = keyword != "range"
                    && matches!(self.peek(), Token::Identifier(w) if w == keyword);
                if chained {
                    self.pos += 1;
                    // `else if` shares the closing {{end}} of the outer node
                    Some(vec![self.parse_control(keyword)?])
                } else {
                    self.expect_right_delim("else")?;
                    let (else_list, end) = self.parse_list(false)?;
                    if end != End::End {
                        return Err(self.error(format!("expected end; found {:?}", end)));
                    }
                    Some(else_list)
                }
            }
        };
        self.vars.truncate(mark);

        let branch = Branch {
            pipe,
            list,
            else_list,
        };
        Ok(match keyword {
            "if" => Node::If(branch),
            "with" => Node::With(branch),
            _ => Node::Range(branch),
        })
    }

    fn parse_template_name(&mut self, context: &str) -> Result<String, TemplateError> {
        match self.next_non_space() {
            Token::Str(name) => Ok(name),
            other => Err(self.error(format!("unexpected {:?} in {} clause", other, context))),
        }
    }

    /// Body of a `define` or `block`, parsed with a fresh variable scope
    fn parse_definition_body(&mut self) -> Result<Vec<Node>, TemplateError> {
        let vars = std::mem::replace(&mut self.vars, vec!["$".to_string()]);
        let range_depth = std::mem::replace(&mut self.range_depth, 0);
        let result = self.parse_list(false);
        self.vars = vars;
        self.range_depth = range_depth;

        let (list, end) = result?;
        if end != End::End {
            return Err(self.error("unexpected EOF in define"));
        }
        Ok(list)
    }

    fn parse_define(&mut self) -> Result<(), TemplateError> {
        let name = self.parse_template_name("define")?;
        self.expect_right_delim("define")?;
        let list = self.parse_definition_body()?;
        self.defines.insert(name, list);
        Ok(())
    }

    fn parse_block(&mut self) -> Result<Node, TemplateError> {
        let line = self.line();
        let name = self.parse_template_name("block")?;
        let pipe = self.parse_pipeline("block", false, false)?;
        let list = self.parse_definition_body()?;
        self.defines.insert(name.clone(), list);
        Ok(Node::Template {
            line,
            name,
            pipe: Some(pipe),
        })
    }

    fn parse_template(&mut self) -> Result<Node, TemplateError> {
        let line = self.line();
        let name = self.parse_template_name("template")?;
        self.skip_spaces();
        let pipe = if *self.peek() == Token::RightDelim {
            self.pos += 1;
            None
        } else {
            Some(self.parse_pipeline("template", false, false)?)
        };
        Ok(Node::Template { line, name, pipe })
    }

    /// Parse a pipeline ending at `}}`
    fn parse_pipeline(
        &mut self,
        context: &str,
        allow_decl: bool,
        allow_two_vars: bool,
    ) -> Result<Pipeline, TemplateError> {
        self.skip_spaces();
        let line = self.line();
        let (decl, is_assign) = if allow_decl {
            self.parse_declaration(allow_two_vars)?
        } else {
            (Vec::new(), false)
        };

        let cmds = self.parse_commands(context, &Token::RightDelim)?;
        self.pos += 1;

        // declared names become visible after the declaring pipeline
        if !is_assign {
            self.vars.extend(decl.iter().cloned());
        }

        Ok(Pipeline {
            line,
            decl,
            is_assign,
            cmds,
        })
    }

    fn parse_declaration(
        &mut self,
        allow_two_vars: bool,
    ) -> Result<(Vec<String>, bool), TemplateError> {
        let start = self.pos;
        let Token::Variable(first) = self.peek().clone() else {
            return Ok((Vec::new(), false));
        };
        self.pos += 1;

        let mut names = vec![first];
        self.skip_spaces();
        if allow_two_vars && *self.peek() == Token::Comma {
            self.pos += 1;
            self.skip_spaces();
            match self.next() {
                Token::Variable(second) => names.push(second),
                other => {
                    return Err(self.error(format!("unexpected {:?} in range declaration", other)))
                }
            }
            self.skip_spaces();
            if *self.peek() != Token::Declare {
                return Err(self.error("expected := after range variables"));
            }
        }

        match self.peek() {
            Token::Declare => {
                self.pos += 1;
                Ok((names, false))
            }
            Token::Assign => {
                self.pos += 1;
                for name in &names {
                    if !self.vars.contains(name) {
                        return Err(self.error(format!("undefined variable {:?}", name)));
                    }
                }
                Ok((names, true))
            }
            _ => {
                self.pos = start;
                Ok((Vec::new(), false))
            }
        }
    }

    fn parse_commands(&mut self, context: &str, end: &Token) -> Result<Vec<Command>, TemplateError> {
        let mut cmds = Vec::new();
        loop {
            self.skip_spaces();
            let cmd = self.parse_command(end)?;
            if cmd.args.is_empty() {
                return Err(self.error(format!("missing value for {}", context)));
            }
            let executable = matches!(
                cmd.args[0],
                Arg::Function(_)
                    | Arg::Field(_)
                    | Arg::Variable(..)
                    | Arg::Chain(..)
                    | Arg::Pipe(_)
                    | Arg::Dot
            );
            if !cmds.is_empty() && !executable {
                return Err(self.error(format!(
                    "non executable command in pipeline stage {}",
                    cmds.len() + 1
                )));
            }
            cmds.push(cmd);

            match self.peek() {
                Token::Pipe => {
                    self.pos += 1;
                }
                token if token == end => return Ok(cmds),
                other => return Err(self.error(format!("unexpected {:?} in {}", other, context))),
            }
        }
    }

    fn parse_command(&mut self, end: &Token) -> Result<Command, TemplateError> {
        let mut args = Vec::new();
        loop {
            self.skip_spaces();
            let token = self.peek().clone();
            if token == *end || token == Token::Pipe {
                return Ok(Command { args });
            }
            match token {
                Token::RightDelim | Token::RightParen | Token::Eof => {
                    return Err(self.error(format!("unexpected {:?} in operand", token)))
                }
                _ => args.push(self.parse_operand()?),
            }
        }
    }

    fn take_fields(&mut self) -> Vec<String> {
        let mut fields = Vec::new();
        while let Token::Field(name) = self.peek() {
            fields.push(name.clone());
            self.pos += 1;
        }
        fields
    }

    fn parse_operand(&mut self) -> Result<Arg, TemplateError> {
        let term = match self.next() {
            Token::Dot => Arg::Dot,
            Token::Field(name) => {
                let mut fields = vec![name];
                fields.extend(self.take_fields());
                return Ok(Arg::Field(fields));
            }
            Token::Variable(name) => {
                if !self.vars.contains(&name) {
                    return Err(self.error(format!("undefined variable {:?}", name)));
                }
                return Ok(Arg::Variable(name, self.take_fields()));
            }
            Token::Str(s) => Arg::Str(s),
            Token::Number(n) => self.parse_number(&n)?,
            Token::Identifier(word) => match word.as_str() {
                "true" => Arg::Bool(true),
                "false" => Arg::Bool(false),
                "nil" => Arg::Nil,
                _ if funcs::is_builtin(&word) => Arg::Function(word),
                _ => return Err(self.error(format!("function {:?} not defined", word))),
            },
            Token::LeftParen => {
                let cmds = self.parse_commands("parenthesized pipeline", &Token::RightParen)?;
                let line = self.line();
                self.pos += 1;
                Arg::Pipe(Box::new(Pipeline {
                    line,
                    decl: Vec::new(),
                    is_assign: false,
                    cmds,
                }))
            }
            other => return Err(self.error(format!("unexpected {:?} in operand", other))),
        };

        let fields = self.take_fields();
        if fields.is_empty() {
            Ok(term)
        } else if matches!(term, Arg::Pipe(_) | Arg::Dot) {
            Ok(Arg::Chain(Box::new(term), fields))
        } else {
            Err(self.error(format!("unexpected . after term {:?}", term.to_string())))
        }
    }

    fn parse_number(&self, text: &str) -> Result<Arg, TemplateError> {
        let cleaned = text.replace('_', "");
        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
        };

        let radix = match digits.get(..2) {
            Some("0x") | Some("0X") => Some(16),
            Some("0o") | Some("0O") => Some(8),
            Some("0b") | Some("0B") => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            return i64::from_str_radix(&digits[2..], radix)
                .map(|n| Arg::Int(if negative { -n } else { n }))
                .map_err(|_| self.error(format!("bad number syntax: {:?}", text)));
        }

        if let Ok(n) = cleaned.parse::<i64>() {
            return Ok(Arg::Int(n));
        }
        cleaned
            .parse::<f64>()
            .map(Arg::Float)
            .map_err(|_| self.error(format!("bad number syntax: {:?}", text)))
    }
}
