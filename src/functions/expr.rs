//! A small expression language for `expr('...')` transforms.
//!
//! ```text
//! expr    := or ( "if" or "else" expr )?
//! or      := and ( "or" and )*
//! and     := not ( "and" not )*
//! not     := "not" not | cmp
//! cmp     := sum ( ("=="|"!="|"<"|"<="|">"|">=") sum )?
//! sum     := product ( ("+"|"-") product )*
//! product := unary ( ("*"|"/"|"//"|"%") unary )*
//! unary   := "-" unary | atom
//! atom    := number | string | None | True | False | name | name "(" args ")" | "(" expr ")"
//! ```
//!
//! `x` is the piped value; other names are context variables.

use crate::graph::{vocab, Term};
use crate::processor::TemplateState;
use crate::template::{MapError, MapResult, Value};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Cond {
        then: Box<Expr>,
        cond: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Evaluate `source` against the piped value, parsing at most once per run
pub fn evaluate(source: &str, x: Value, state: &mut TemplateState<'_>) -> MapResult<Value> {
    let expr = match state.run.cached_expression(source) {
        Some(expr) => expr,
        None => {
            let expr = Rc::new(parse(source)?);
            state.run.cache_expression(source, Rc::clone(&expr));
            expr
        }
    };
    Eval { source, x: &x, state }.eval(&expr)
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(Value),
    Str(String),
    Name(String),
    Op(&'static str),
}

const OPERATORS: &[&str] = &[
    "//", "==", "!=", "<=", ">=", "+", "-", "*", "/", "%", "<", ">", "(", ")", ",",
];

fn lex(source: &str) -> MapResult<Vec<Tok>> {
    let err = |message: String| MapError::Expression {
        expr: source.to_string(),
        message,
    };
    let chars: Vec<char> = source.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let num = match text.parse::<i64>() {
                Ok(n) => Value::Int(n),
                Err(_) => Value::Float(
                    text.parse::<f64>()
                        .map_err(|_| err(format!("bad number {}", text)))?,
                ),
            };
            toks.push(Tok::Num(num));
        } else if c == '\'' || c == '"' {
            let start = i + 1;
            i = start;
            while i < chars.len() && chars[i] != c {
                i += 1;
            }
            if i == chars.len() {
                return Err(err("unterminated string".to_string()));
            }
            toks.push(Tok::Str(chars[start..i].iter().collect()));
            i += 1;
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            toks.push(Tok::Name(chars[start..i].iter().collect()));
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let op = OPERATORS
                .iter()
                .find(|op| rest.starts_with(**op))
                .ok_or_else(|| err(format!("unexpected character '{}'", c)))?;
            toks.push(Tok::Op(*op));
            i += op.chars().count();
        }
    }
    Ok(toks)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

pub fn parse(source: &str) -> MapResult<Expr> {
    let mut p = Parser {
        source,
        toks: lex(source)?,
        pos: 0,
    };
    let expr = p.expr()?;
    if p.pos < p.toks.len() {
        return Err(p.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'s> {
    source: &'s str,
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> MapError {
        MapError::Expression {
            expr: self.source.to_string(),
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Name(n)) if n == kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> MapResult<Expr> {
        let then = self.or()?;
        if self.eat_keyword("if") {
            let cond = self.or()?;
            if !self.eat_keyword("else") {
                return Err(self.error("expected 'else'"));
            }
            let otherwise = self.expr()?;
            return Ok(Expr::Cond {
                then: Box::new(then),
                cond: Box::new(cond),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(then)
    }

    fn or(&mut self) -> MapResult<Expr> {
        let mut lhs = self.and()?;
        while self.eat_keyword("or") {
            lhs = Expr::Or(Box::new(lhs), Box::new(self.and()?));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> MapResult<Expr> {
        let mut lhs = self.not()?;
        while self.eat_keyword("and") {
            lhs = Expr::And(Box::new(lhs), Box::new(self.not()?));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> MapResult<Expr> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> MapResult<Expr> {
        let lhs = self.sum()?;
        for (op, bin) in [
            ("==", BinOp::Eq),
            ("!=", BinOp::Ne),
            ("<=", BinOp::Le),
            (">=", BinOp::Ge),
            ("<", BinOp::Lt),
            (">", BinOp::Gt),
        ] {
            if self.eat_op(op) {
                return Ok(Expr::Binary(bin, Box::new(lhs), Box::new(self.sum()?)));
            }
        }
        Ok(lhs)
    }

    fn sum(&mut self) -> MapResult<Expr> {
        let mut lhs = self.product()?;
        loop {
            let op = if self.eat_op("+") {
                BinOp::Add
            } else if self.eat_op("-") {
                BinOp::Sub
            } else {
                return Ok(lhs);
            };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.product()?));
        }
    }

    fn product(&mut self) -> MapResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat_op("*") {
                BinOp::Mul
            } else if self.eat_op("//") {
                BinOp::FloorDiv
            } else if self.eat_op("/") {
                BinOp::Div
            } else if self.eat_op("%") {
                BinOp::Rem
            } else {
                return Ok(lhs);
            };
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> MapResult<Expr> {
        if self.eat_op("-") {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.atom()
    }

    fn atom(&mut self) -> MapResult<Expr> {
        let tok = self
            .peek()
            .cloned()
            .ok_or_else(|| self.error("unexpected end of expression"))?;
        self.pos += 1;
        match tok {
            Tok::Num(v) => Ok(Expr::Literal(v)),
            Tok::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Tok::Op("(") => {
                let inner = self.expr()?;
                if !self.eat_op(")") {
                    return Err(self.error("expected ')'"));
                }
                Ok(inner)
            }
            Tok::Name(name) => match name.as_str() {
                "None" | "null" => Ok(Expr::Literal(Value::Null)),
                "True" | "true" => Ok(Expr::Literal(Value::Bool(true))),
                "False" | "false" => Ok(Expr::Literal(Value::Bool(false))),
                _ if self.eat_op("(") => {
                    let mut args = Vec::new();
                    if !self.eat_op(")") {
                        loop {
                            args.push(self.expr()?);
                            if self.eat_op(")") {
                                break;
                            }
                            if !self.eat_op(",") {
                                return Err(self.error("expected ',' or ')'"));
                            }
                        }
                    }
                    Ok(Expr::Call(name, args))
                }
                _ => Ok(Expr::Var(name)),
            },
            Tok::Op(op) => Err(self.error(&format!("unexpected '{}'", op))),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

struct Eval<'e, 's> {
    source: &'e str,
    x: &'e Value,
    state: &'e mut TemplateState<'s>,
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::Map(m) => !m.is_empty(),
        Value::Term(_) => true,
    }
}

/// Numbers, including typed literals carrying a number
fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Term(Term::Literal(lit)) => lit.lexical.parse().ok(),
        _ => None,
    }
}

/// `xsd:integer` literals take part in arithmetic as integers
fn integral(v: Value) -> Value {
    let parsed = match &v {
        Value::Term(Term::Literal(lit)) if lit.datatype() == vocab::XSD_INTEGER => {
            lit.lexical.trim().parse::<i64>().ok()
        }
        _ => None,
    };
    parsed.map(Value::Int).unwrap_or(v)
}

fn text(v: &Value) -> String {
    v.as_text().unwrap_or_default()
}

impl Eval<'_, '_> {
    fn error(&self, message: impl Into<String>) -> MapError {
        MapError::Expression {
            expr: self.source.to_string(),
            message: message.into(),
        }
    }

    fn eval(&mut self, expr: &Expr) -> MapResult<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var(name) if name == "x" => Ok(self.x.clone()),
            Expr::Var(name) => Ok(self.state.lookup(name)),
            Expr::Neg(inner) => match integral(self.eval(inner)?) {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| self.error("integer overflow")),
                other => number(&other)
                    .map(|f| Value::Float(-f))
                    .ok_or_else(|| self.error(format!("cannot negate {:?}", other))),
            },
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&self.eval(inner)?))),
            Expr::And(a, b) => {
                let lhs = self.eval(a)?;
                if truthy(&lhs) {
                    self.eval(b)
                } else {
                    Ok(lhs)
                }
            }
            Expr::Or(a, b) => {
                let lhs = self.eval(a)?;
                if truthy(&lhs) {
                    Ok(lhs)
                } else {
                    self.eval(b)
                }
            }
            Expr::Cond {
                then,
                cond,
                otherwise,
            } => {
                if truthy(&self.eval(cond)?) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Binary(op, a, b) => {
                let lhs = integral(self.eval(a)?);
                let rhs = integral(self.eval(b)?);
                self.binary(*op, lhs, rhs)
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| self.eval(a))
                    .collect::<MapResult<Vec<_>>>()?;
                self.call(name, args)
            }
        }
    }

    fn binary(&self, op: BinOp, lhs: Value, rhs: Value) -> MapResult<Value> {
        use BinOp::*;
        match op {
            Eq => return Ok(Value::Bool(equal(&lhs, &rhs))),
            Ne => return Ok(Value::Bool(!equal(&lhs, &rhs))),
            Lt | Le | Gt | Ge => {
                let ord = match (number(&lhs), number(&rhs)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => match (&lhs, &rhs) {
                        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                        _ => None,
                    },
                }
                .ok_or_else(|| self.error(format!("cannot compare {:?} and {:?}", lhs, rhs)))?;
                return Ok(Value::Bool(match op {
                    Lt => ord.is_lt(),
                    Le => ord.is_le(),
                    Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                }));
            }
            _ => {}
        }

        if let (Add, Value::Str(a), Value::Str(b)) = (op, &lhs, &rhs) {
            return Ok(Value::Str(format!("{}{}", a, b)));
        }
        if let (Value::Int(a), Value::Int(b)) = (&lhs, &rhs) {
            let (a, b) = (*a, *b);
            let result = match op {
                Div if b == 0 => return Err(self.error("division by zero")),
                Div => return Ok(Value::Float(a as f64 / b as f64)),
                FloorDiv | Rem if b == 0 => return Err(self.error("division by zero")),
                Add => a.checked_add(b),
                Sub => a.checked_sub(b),
                Mul => a.checked_mul(b),
                // Quotient and remainder round toward negative infinity
                FloorDiv => a.checked_div_euclid(b).and_then(|q| {
                    if b < 0 && a.rem_euclid(b) != 0 {
                        q.checked_sub(1)
                    } else {
                        Some(q)
                    }
                }),
                Rem => a
                    .checked_rem_euclid(b)
                    .map(|r| if b < 0 && r != 0 { r + b } else { r }),
                _ => unreachable!("comparisons handled above"),
            };
            return result
                .map(Value::Int)
                .ok_or_else(|| self.error("integer overflow"));
        }

        let (Some(a), Some(b)) = (number(&lhs), number(&rhs)) else {
            return Err(self.error(format!("unsupported operands {:?} and {:?}", lhs, rhs)));
        };
        let result = match op {
            Add => a + b,
            Sub => a - b,
            Mul => a * b,
            Div | FloorDiv | Rem if b == 0.0 => return Err(self.error("division by zero")),
            Div => a / b,
            FloorDiv => (a / b).floor(),
            Rem => a - b * (a / b).floor(),
            _ => unreachable!("comparisons handled above"),
        };
        Ok(Value::Float(result))
    }

    fn call(&self, name: &str, args: Vec<Value>) -> MapResult<Value> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        match name {
            "str" => Ok(Value::Str(arg(0).render())),
            "int" => {
                let v = arg(0);
                if let Value::Int(i) = v {
                    return Ok(Value::Int(i));
                }
                let t = text(&v);
                t.trim()
                    .parse::<i64>()
                    .ok()
                    .or_else(|| number(&v).or_else(|| t.trim().parse::<f64>().ok()).map(|f| f.trunc() as i64))
                    .map(Value::Int)
                    .ok_or_else(|| self.error(format!("int() cannot convert {:?}", v)))
            }
            "float" => {
                let v = arg(0);
                number(&v)
                    .or_else(|| text(&v).trim().parse::<f64>().ok())
                    .map(Value::Float)
                    .ok_or_else(|| self.error(format!("float() cannot convert {:?}", v)))
            }
            "len" => match arg(0) {
                Value::List(items) => Ok(Value::Int(items.len() as i64)),
                Value::Map(m) => Ok(Value::Int(m.len() as i64)),
                v => Ok(Value::Int(text(&v).chars().count() as i64)),
            },
            "upper" => Ok(Value::Str(text(&arg(0)).to_uppercase())),
            "lower" => Ok(Value::Str(text(&arg(0)).to_lowercase())),
            "strip" => Ok(Value::Str(text(&arg(0)).trim().to_string())),
            "replace" => Ok(Value::Str(
                text(&arg(0)).replace(&text(&arg(1)), &text(&arg(2))),
            )),
            "round" => {
                let v = arg(0);
                let f = number(&v).ok_or_else(|| self.error(format!("round() cannot use {:?}", v)))?;
                match args.get(1) {
                    Some(Value::Int(digits)) => {
                        let scale = 10f64.powi(*digits as i32);
                        Ok(Value::Float((f * scale).round() / scale))
                    }
                    _ => Ok(Value::Int(f.round() as i64)),
                }
            }
            "concat" => Ok(Value::Str(args.iter().map(Value::render).collect())),
            other => Err(self.error(format!("unknown function {}", other))),
        }
    }
}

fn equal(a: &Value, b: &Value) -> bool {
    match (number(a), number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Literal;
    use crate::processor::testing::Harness;

    fn eval_with(source: &str, x: Value) -> MapResult<Value> {
        let mut h = Harness::new("{}");
        let mut state = h.state([("factor", Value::Int(3))]);
        evaluate(source, x, &mut state)
    }

    #[test]
    fn division_and_modulo_floor() {
        assert_eq!(eval_with("1 + 2 * 3", Value::Null).unwrap(), Value::Int(7));
        assert_eq!(eval_with("7 / 2", Value::Null).unwrap(), Value::Float(3.5));
        assert_eq!(eval_with("7 // 2", Value::Null).unwrap(), Value::Int(3));
        assert_eq!(eval_with("-7 // 2", Value::Null).unwrap(), Value::Int(-4));
        assert_eq!(eval_with("-7 % 3", Value::Null).unwrap(), Value::Int(2));
        assert!(eval_with("1 / 0", Value::Null).is_err());
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let max = Value::Int(i64::MAX);
        assert!(matches!(eval_with("x + 1", max.clone()), Err(MapError::Expression { .. })));
        assert!(matches!(eval_with("x * 2", max.clone()), Err(MapError::Expression { .. })));
        assert!(eval_with("-x - 2", max.clone()).is_err());
        assert!(eval_with("x // -1", Value::Int(i64::MIN)).is_err());
        assert_eq!(eval_with("7 % x", max.clone()).unwrap(), Value::Int(7));
        assert_eq!(eval_with("-7 % x", max).unwrap(), Value::Int(i64::MAX - 7));
        assert_eq!(eval_with("7 % -2", Value::Null).unwrap(), Value::Int(-1));
        assert_eq!(eval_with("7 // -2", Value::Null).unwrap(), Value::Int(-4));
        assert!(eval_with("-x", Value::Int(i64::MIN)).is_err());
    }

    #[test]
    fn integer_literals_stay_integers() {
        let five = Value::Term(Term::Literal(Literal::integer(5)));
        assert_eq!(eval_with("x + 1", five.clone()).unwrap(), Value::Int(6));
        assert_eq!(eval_with("-x", five).unwrap(), Value::Int(-5));
        let half = Value::Term(Term::Literal(Literal::double(0.5)));
        assert_eq!(eval_with("x + 1", half).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn piped_value_and_context_names() {
        assert_eq!(
            eval_with("int(x) * factor", Value::str("5")).unwrap(),
            Value::Int(15)
        );
        assert_eq!(
            eval_with("x + '-suffix'", Value::str("a")).unwrap(),
            Value::str("a-suffix")
        );
    }

    #[test]
    fn conditionals_and_logic() {
        assert_eq!(
            eval_with("'big' if int(x) > 10 else 'small'", Value::str("12")).unwrap(),
            Value::str("big")
        );
        assert_eq!(
            eval_with("not x or 'fallback'", Value::str("")).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval_with("x and upper(x)", Value::str("abc")).unwrap(),
            Value::str("ABC")
        );
    }

    #[test]
    fn helper_functions() {
        assert_eq!(
            eval_with("replace(strip(x), ' ', '_')", Value::str(" a b ")).unwrap(),
            Value::str("a_b")
        );
        assert_eq!(eval_with("len(x)", Value::str("abcd")).unwrap(), Value::Int(4));
        assert_eq!(eval_with("round(2.567, 2)", Value::Null).unwrap(), Value::Float(2.57));
        assert_eq!(
            eval_with("concat('a', 1, x)", Value::str("z")).unwrap(),
            Value::str("a1z")
        );
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(matches!(parse("1 +"), Err(MapError::Expression { .. })));
        assert!(matches!(parse("'open"), Err(MapError::Expression { .. })));
        assert!(matches!(parse("a if b"), Err(MapError::Expression { .. })));
        assert!(eval_with("nope(1)", Value::Null).is_err());
    }

    #[test]
    fn expressions_are_cached_per_source() {
        let mut h = Harness::new("{}");
        let mut state = h.state(Vec::<(String, Value)>::new());
        evaluate("x + 1", Value::Int(1), &mut state).unwrap();
        let cached = state.run.cached_expression("x + 1");
        assert!(cached.is_some());
        assert_eq!(evaluate("x + 1", Value::Int(2), &mut state).unwrap(), Value::Int(3));
    }
}
