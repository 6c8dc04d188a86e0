//! Parsing of function-call chain elements: `name` or `name(arg, 'lit', [..])`
//!
//! Each distinct call text is parsed once per run and memoized as a
//! [`BoundCall`]; arguments are resolved against the context at call time.

use crate::processor::TemplateState;
use crate::template::{MapError, MapResult, Value};
use std::rc::Rc;

/// An argument in a call
#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    /// Quoted string, number, boolean, or `None`
    Literal(Value),
    /// Bare token: a context variable, falling back to the token text
    Var(String),
    /// `[...]` or `(...)`
    List(Vec<CallArg>),
}

/// A parsed function call with unresolved arguments
#[derive(Debug, Clone, PartialEq)]
pub struct BoundCall {
    pub name: String,
    pub args: Vec<CallArg>,
}

impl BoundCall {
    pub fn parse(text: &str) -> MapResult<Self> {
        let mut parser = Parser {
            text,
            chars: text.char_indices().collect(),
            pos: 0,
        };
        let call = parser.call()?;
        parser.skip_ws();
        if parser.pos < parser.chars.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(call)
    }

    /// Resolve arguments and apply the function to `value`
    pub fn invoke(&self, value: Value, state: &mut TemplateState<'_>) -> MapResult<Value> {
        let env = state.env;
        let f = env
            .functions
            .get(&self.name)
            .ok_or_else(|| MapError::UnknownFunction(self.name.clone()))?;
        let args: Vec<Value> = self.args.iter().map(|a| resolve_arg(a, state)).collect();
        f(value, state, &args)
    }
}

fn resolve_arg(arg: &CallArg, state: &mut TemplateState<'_>) -> Value {
    match arg {
        CallArg::Literal(v) => v.clone(),
        CallArg::List(items) => Value::List(items.iter().map(|a| resolve_arg(a, state)).collect()),
        CallArg::Var(token) => match state.get(token) {
            Some(v) if !v.is_empty() => v,
            _ => {
                if state.run.flag_literal_fallback(token) {
                    tracing::warn!(
                        token = %token,
                        "call argument is not a bound variable, using it as literal text; quote it if a literal was intended"
                    );
                }
                Value::str(token.clone())
            }
        },
    }
}

/// Look up (or parse and memoize) the call for a chain element
pub fn resolve_call(text: &str, state: &mut TemplateState<'_>) -> MapResult<Rc<BoundCall>> {
    if let Some(call) = state.run.cached_call(text) {
        return Ok(call);
    }
    let call = BoundCall::parse(text)?;
    if !state.env.functions.contains(&call.name) {
        return Err(MapError::UnknownFunction(call.name));
    }
    let call = Rc::new(call);
    state.run.cache_call(text, Rc::clone(&call));
    Ok(call)
}

struct Parser<'t> {
    text: &'t str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> MapError {
        MapError::CallSyntax {
            call: self.text.to_string(),
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, ch: char) -> MapResult<()> {
        self.skip_ws();
        if self.peek() == Some(ch) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", ch)))
        }
    }

    fn call(&mut self) -> MapResult<BoundCall> {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a function name"));
        }
        let name: String = self.chars[start..self.pos].iter().map(|(_, c)| c).collect();

        self.skip_ws();
        let args = if self.peek() == Some('(') {
            self.pos += 1;
            self.args(')')?
        } else {
            Vec::new()
        };
        Ok(BoundCall { name, args })
    }

    /// Comma-separated arguments up to and including `close`
    fn args(&mut self, close: char) -> MapResult<Vec<CallArg>> {
        let mut args = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(args);
            }
            args.push(self.arg()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {}
                _ => return Err(self.error(&format!("expected ',' or '{}'", close))),
            }
        }
    }

    fn arg(&mut self) -> MapResult<CallArg> {
        self.skip_ws();
        match self.peek() {
            Some(q @ ('\'' | '"')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != q) {
                    self.pos += 1;
                }
                let literal: String = self.chars[start..self.pos].iter().map(|(_, c)| c).collect();
                self.expect(q)?;
                Ok(CallArg::Literal(Value::Str(literal)))
            }
            Some('[') => {
                self.pos += 1;
                Ok(CallArg::List(self.args(']')?))
            }
            Some('(') => {
                self.pos += 1;
                Ok(CallArg::List(self.args(')')?))
            }
            Some(_) => {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| !c.is_whitespace() && !",()[]'\"".contains(c))
                {
                    self.pos += 1;
                }
                if start == self.pos {
                    return Err(self.error("expected an argument"));
                }
                let token: String = self.chars[start..self.pos].iter().map(|(_, c)| c).collect();
                Ok(bare_token(token))
            }
            None => Err(self.error("unexpected end of call")),
        }
    }
}

fn bare_token(token: String) -> CallArg {
    match token.as_str() {
        "None" | "null" => CallArg::Literal(Value::Null),
        "True" | "true" => CallArg::Literal(Value::Bool(true)),
        "False" | "false" => CallArg::Literal(Value::Bool(false)),
        _ => {
            if let Ok(i) = token.parse::<i64>() {
                CallArg::Literal(Value::Int(i))
            } else if let Ok(f) = token.parse::<f64>() {
                CallArg::Literal(Value::Float(f))
            } else {
                CallArg::Var(token)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::testing::Harness;

    fn lit(s: &str) -> CallArg {
        CallArg::Literal(Value::str(s))
    }

    #[test]
    fn parses_bare_name() {
        let call = BoundCall::parse("asInt").unwrap();
        assert_eq!(call.name, "asInt");
        assert!(call.args.is_empty());
    }

    #[test]
    fn parses_literals_variables_and_lists() {
        let call = BoundCall::parse(
            "reconcile('substance', None, \"http://x/api\", [('skos:inScheme', 'ex:s')], True, 3, label)",
        )
        .unwrap();
        assert_eq!(call.name, "reconcile");
        assert_eq!(
            call.args,
            vec![
                lit("substance"),
                CallArg::Literal(Value::Null),
                lit("http://x/api"),
                CallArg::List(vec![CallArg::List(vec![lit("skos:inScheme"), lit("ex:s")])]),
                CallArg::Literal(Value::Bool(true)),
                CallArg::Literal(Value::Int(3)),
                CallArg::Var("label".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_malformed_calls() {
        assert!(BoundCall::parse("map_by('unterminated)").is_err());
        assert!(BoundCall::parse("fn(a b)").is_err());
        assert!(BoundCall::parse("fn(a) trailing").is_err());
        assert!(BoundCall::parse("('no name')").is_err());
    }

    #[test]
    fn bare_arguments_resolve_against_context_then_fall_back() {
        let mut h = Harness::new("{}");
        let mut state = h.state([("sep", Value::str(";"))]);
        assert_eq!(resolve_arg(&CallArg::Var("sep".into()), &mut state), Value::str(";"));
        assert_eq!(
            resolve_arg(&CallArg::Var("scheme1".into()), &mut state),
            Value::str("scheme1")
        );
    }

    #[test]
    fn calls_are_memoized_and_unknown_names_rejected() {
        let mut h = Harness::new("{}");
        let mut state = h.state(Vec::<(String, Value)>::new());
        let first = resolve_call("split(',')", &mut state).unwrap();
        let second = resolve_call("split(',')", &mut state).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert!(matches!(
            resolve_call("nope('x')", &mut state),
            Err(MapError::UnknownFunction(name)) if name == "nope"
        ));
    }
}
