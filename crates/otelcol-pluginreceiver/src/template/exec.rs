//! Template executor
//!
//! Walks a parsed [`Tree`] against a YAML value. Missing mapping keys
//! evaluate to null and print as `<no value>`; a field of a null value is
//! an execution error.

use super::funcs;
use super::parse::{Arg, Branch, Command, Node, Pipeline, Tree};
use super::TemplateError;
use serde_yaml::Value;

/// Maximum nesting of `{{template}}` calls
const MAX_TEMPLATE_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

struct State<'a> {
    name: &'a str,
    tree: &'a Tree,
    out: String,
    vars: Vec<(String, Value)>,
    depth: usize,
    line: usize,
}

pub(crate) fn execute(name: &str, tree: &Tree, data: &Value) -> Result<String, TemplateError> {
    let mut state = State {
        name,
        tree,
        out: String::new(),
        vars: vec![("$".to_string(), data.clone())],
        depth: 0,
        line: 1,
    };
    state.walk(data, &tree.root)?;
    Ok(state.out)
}

impl<'a> State<'a> {
    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::execution(self.name, self.line, message)
    }

    fn walk(&mut self, dot: &Value, nodes: &[Node]) -> Result<Flow, TemplateError> {
        for node in nodes {
            let flow = match node {
                Node::Text(text) => {
                    self.out.push_str(text);
                    Flow::Normal
                }
                Node::Action(pipe) => {
                    let value = self.eval_pipeline(dot, pipe)?;
                    if pipe.decl.is_empty() {
                        self.out.push_str(&funcs::format_value(&value));
                    }
                    Flow::Normal
                }
                Node::If(branch) => self.walk_if_or_with(dot, branch, false)?,
                Node::With(branch) => self.walk_if_or_with(dot, branch, true)?,
                Node::Range(branch) => self.walk_range(dot, branch)?,
                Node::Template { line, name, pipe } => {
                    self.line = *line;
                    let data = match pipe {
                        Some(pipe) => self.eval_pipeline(dot, pipe)?,
                        None => Value::Null,
                    };
                    self.walk_template(name, &data)?;
                    Flow::Normal
                }
                Node::Break => Flow::Break,
                Node::Continue => Flow::Continue,
            };
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn walk_if_or_with(
        &mut self,
        dot: &Value,
        branch: &Branch,
        with: bool,
    ) -> Result<Flow, TemplateError> {
        let mark = self.vars.len();
        let value = self.eval_pipeline(dot, &branch.pipe)?;
        let flow = if funcs::truth(&value) {
            let inner = if with { &value } else { dot };
            self.walk(inner, &branch.list)?
        } else if let Some(else_list) = &branch.else_list {
            self.walk(dot, else_list)?
        } else {
            Flow::Normal
        };
        self.vars.truncate(mark);
        Ok(flow)
    }

    fn walk_range(&mut self, dot: &Value, branch: &Branch) -> Result<Flow, TemplateError> {
        let mark = self.vars.len();
        let value = self.eval_commands(dot, &branch.pipe)?;

        let items: Box<dyn Iterator<Item = (Value, Value)> + '_> = match untag(&value) {
            Value::Null => Box::new(std::iter::empty()),
            Value::Sequence(seq) => Box::new(
                seq.iter()
                    .enumerate()
                    .map(|(i, v)| (Value::from(i as u64), v.clone())),
            ),
            Value::Mapping(map) => {
                let mut entries: Vec<(Value, Value)> =
                    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                entries.sort_by(|a, b| funcs::compare_keys(&a.0, &b.0));
                Box::new(entries.into_iter())
            }
            Value::Number(n) if n.as_i64().is_some() => {
                let count = n.as_i64().unwrap_or(0).max(0);
                Box::new((0..count).map(|i| (Value::from(i), Value::from(i))))
            }
            other => {
                return Err(self.error(format!(
                    "range can't iterate over {}",
                    funcs::format_value(other)
                )))
            }
        };
        let mut items = items.peekable();

        if items.peek().is_none() {
            let flow = match &branch.else_list {
                Some(else_list) => self.walk(dot, else_list)?,
                None => Flow::Normal,
            };
            self.vars.truncate(mark);
            return Ok(flow);
        }

        for (key, elem) in items {
            self.vars.truncate(mark);
            match branch.pipe.decl.as_slice() {
                [] => {}
                [only] => self.bind(only, elem.clone(), branch.pipe.is_assign)?,
                [first, second, ..] => {
                    self.bind(first, key, false)?;
                    self.bind(second, elem.clone(), false)?;
                }
            }
            if self.walk(&elem, &branch.list)? == Flow::Break {
                break;
            }
        }
        self.vars.truncate(mark);
        Ok(Flow::Normal)
    }

    fn walk_template(&mut self, name: &str, data: &Value) -> Result<(), TemplateError> {
        let tree = self.tree;
        let Some(list) = tree.defines.get(name) else {
            return Err(self.error(format!("no such template {:?}", name)));
        };
        if self.depth >= MAX_TEMPLATE_DEPTH {
            return Err(self.error(format!(
                "exceeded maximum template depth ({})",
                MAX_TEMPLATE_DEPTH
            )));
        }

        self.depth += 1;
        let vars = std::mem::replace(&mut self.vars, vec![("$".to_string(), data.clone())]);
        let result = self.walk(data, list);
        self.vars = vars;
        self.depth -= 1;
        result.map(|_| ())
    }

    fn bind(&mut self, name: &str, value: Value, assign: bool) -> Result<(), TemplateError> {
        if !assign {
            self.vars.push((name.to_string(), value));
            return Ok(());
        }
        match self.vars.iter_mut().rev().find(|(n, _)| n == name) {
            Some(slot) => {
                slot.1 = value;
                Ok(())
            }
            None => Err(self.error(format!("undefined variable: {}", name))),
        }
    }

    fn variable(&self, name: &str) -> Result<Value, TemplateError> {
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| self.error(format!("undefined variable: {}", name)))
    }

    /// Evaluate a pipeline and bind its declared variables
    fn eval_pipeline(&mut self, dot: &Value, pipe: &Pipeline) -> Result<Value, TemplateError> {
        let value = self.eval_commands(dot, pipe)?;
        for name in &pipe.decl {
            self.bind(name, value.clone(), pipe.is_assign)?;
        }
        Ok(value)
    }

    fn eval_commands(&mut self, dot: &Value, pipe: &Pipeline) -> Result<Value, TemplateError> {
        self.line = pipe.line;
        let mut value = None;
        for cmd in &pipe.cmds {
            value = Some(self.eval_command(dot, cmd, value)?);
        }
        Ok(value.unwrap_or(Value::Null))
    }

    fn eval_command(
        &mut self,
        dot: &Value,
        cmd: &Command,
        piped: Option<Value>,
    ) -> Result<Value, TemplateError> {
        let Some((first, rest)) = cmd.args.split_first() else {
            return Err(self.error("empty command"));
        };
        match first {
            Arg::Function(name) => self.call(dot, name, rest, piped),
            Arg::Nil => Err(self.error("nil is not a command")),
            other => {
                if !rest.is_empty() || piped.is_some() {
                    return Err(self.error(format!(
                        "can't give argument to non-function {}",
                        other
                    )));
                }
                self.eval_arg(dot, other)
            }
        }
    }

    fn call(
        &mut self,
        dot: &Value,
        name: &str,
        args: &[Arg],
        piped: Option<Value>,
    ) -> Result<Value, TemplateError> {
        if name == "and" || name == "or" {
            return self.call_logical(dot, name, args, piped);
        }

        let mut values = Vec::with_capacity(args.len() + 1);
        for arg in args {
            values.push(self.eval_arg(dot, arg)?);
        }
        values.extend(piped);
        funcs::call(name, &values).map_err(|e| self.error(format!("error calling {}: {}", name, e)))
    }

    /// `and` and `or` stop evaluating once the result is known
    fn call_logical(
        &mut self,
        dot: &Value,
        name: &str,
        args: &[Arg],
        piped: Option<Value>,
    ) -> Result<Value, TemplateError> {
        let total = args.len() + usize::from(piped.is_some());
        if total == 0 {
            return Err(self.error(format!(
                "wrong number of args for {}: want at least 1 got 0",
                name
            )));
        }

        let want = name == "or";
        let mut last = Value::Null;
        for arg in args {
            last = self.eval_arg(dot, arg)?;
            if funcs::truth(&last) == want {
                return Ok(last);
            }
        }
        if let Some(value) = piped {
            last = value;
        }
        Ok(last)
    }

    fn eval_arg(&mut self, dot: &Value, arg: &Arg) -> Result<Value, TemplateError> {
        match arg {
            Arg::Dot => Ok(dot.clone()),
            Arg::Nil => Ok(Value::Null),
            Arg::Bool(b) => Ok(Value::Bool(*b)),
            Arg::Int(i) => Ok(Value::from(*i)),
            Arg::Float(f) => Ok(Value::from(*f)),
            Arg::Str(s) => Ok(Value::String(s.clone())),
            Arg::Field(fields) => self.fields(dot.clone(), fields),
            Arg::Variable(name, fields) => {
                let value = self.variable(name)?;
                self.fields(value, fields)
            }
            Arg::Chain(inner, fields) => {
                let value = self.eval_arg(dot, inner)?;
                self.fields(value, fields)
            }
            Arg::Pipe(pipe) => self.eval_commands(dot, pipe),
            Arg::Function(name) => self.call(dot, name, &[], None),
        }
    }

    fn fields(&self, mut value: Value, names: &[String]) -> Result<Value, TemplateError> {
        for name in names {
            value = match untag(&value) {
                Value::Mapping(map) => map.get(name.as_str()).cloned().unwrap_or(Value::Null),
                Value::Null => {
                    return Err(self.error(format!(
                        "nil pointer evaluating interface {{}}.{}",
                        name
                    )))
                }
                other => {
                    return Err(self.error(format!(
                        "can't evaluate field {} in type {}",
                        name,
                        funcs::type_name(other)
                    )))
                }
            };
        }
        Ok(value)
    }
}

fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}
