//! User-defined vector fields.
//!
//! Expressions are parsed into an [`Expr`] tree, compiled into a flat
//! [`Bytecode`] program with variables and parameters resolved to indices,
//! and evaluated by a small stack machine over any [`Scalar`]. Evaluating
//! over `Dual` gives exact Jacobian-vector products through
//! [`AutodiffField`](crate::autodiff::AutodiffField).

use crate::autodiff::Dual;
use crate::traits::{DynamicalSystem, Scalar};
use anyhow::{anyhow, bail, Context, Result};
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    LoadConst(f64),
    LoadVar(usize),
    LoadParam(usize),
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Neg,
    Call(Function),
}

/// Built-in unary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sqrt,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Function::Sin),
            "cos" => Some(Function::Cos),
            "tan" => Some(Function::Tan),
            "exp" => Some(Function::Exp),
            "ln" | "log" => Some(Function::Ln),
            "sqrt" => Some(Function::Sqrt),
            _ => None,
        }
    }

    fn apply<T: Scalar>(self, a: T) -> T {
        match self {
            Function::Sin => a.sin(),
            Function::Cos => a.cos(),
            Function::Tan => a.tan(),
            Function::Exp => a.exp(),
            Function::Ln => a.ln(),
            Function::Sqrt => a.sqrt(),
        }
    }
}

/// A compiled expression. Programs produced by [`Compiler::compile`] are
/// stack-balanced, so evaluation never underflows.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Stateless stack machine; `stack` is caller-owned scratch space.
pub struct VM;

impl VM {
    pub fn execute<T: Scalar>(
        bytecode: &Bytecode,
        vars: &[T],
        params: &[f64],
        stack: &mut Vec<T>,
    ) -> T {
        stack.clear();

        for op in &bytecode.ops {
            let value = match *op {
                OpCode::LoadConst(val) => T::from_f64(val),
                OpCode::LoadVar(idx) => vars[idx],
                OpCode::LoadParam(idx) => T::from_f64(params[idx]),
                OpCode::Neg => -pop(stack),
                OpCode::Call(func) => func.apply(pop(stack)),
                binary => {
                    let b = pop(stack);
                    let a = pop(stack);
                    match binary {
                        OpCode::Add => a + b,
                        OpCode::Sub => a - b,
                        OpCode::Mul => a * b,
                        OpCode::Div => a / b,
                        _ => a.powf(b),
                    }
                }
            };
            stack.push(value);
        }

        stack.pop().unwrap_or_else(T::zero)
    }
}

fn pop<T: Scalar>(stack: &mut Vec<T>) -> T {
    stack.pop().unwrap_or_else(T::zero)
}

/// Expression tree produced by [`parse`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary(Box<Expr>, char, Box<Expr>),
    Negate(Box<Expr>),
    Call(String, Box<Expr>),
}

/// Resolves variable and parameter names to indices and emits bytecode.
pub struct Compiler {
    pub var_map: HashMap<String, usize>,
    pub param_map: HashMap<String, usize>,
}

impl Compiler {
    pub fn new(var_names: &[String], param_names: &[String]) -> Self {
        let index = |names: &[String]| {
            names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), i))
                .collect::<HashMap<_, _>>()
        };
        Self {
            var_map: index(var_names),
            param_map: index(param_names),
        }
    }

    pub fn compile(&self, expr: &Expr) -> Result<Bytecode> {
        let mut ops = Vec::new();
        self.emit(expr, &mut ops)?;
        Ok(Bytecode { ops })
    }

    fn emit(&self, expr: &Expr, ops: &mut Vec<OpCode>) -> Result<()> {
        match expr {
            Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
            Expr::Variable(name) => {
                if let Some(&idx) = self.var_map.get(name) {
                    ops.push(OpCode::LoadVar(idx));
                } else if let Some(&idx) = self.param_map.get(name) {
                    ops.push(OpCode::LoadParam(idx));
                } else {
                    bail!("Unknown variable or parameter: {name}");
                }
            }
            Expr::Binary(left, op, right) => {
                self.emit(left, ops)?;
                self.emit(right, ops)?;
                ops.push(match op {
                    '+' => OpCode::Add,
                    '-' => OpCode::Sub,
                    '*' => OpCode::Mul,
                    '/' => OpCode::Div,
                    '^' => OpCode::Pow,
                    other => bail!("Unknown binary operator: {other}"),
                });
            }
            Expr::Negate(operand) => {
                self.emit(operand, ops)?;
                ops.push(OpCode::Neg);
            }
            Expr::Call(name, arg) => {
                let func =
                    Function::lookup(name).ok_or_else(|| anyhow!("Unknown function: {name}"))?;
                self.emit(arg, ops)?;
                ops.push(OpCode::Call(func));
            }
        }
        Ok(())
    }
}

// --- Parser ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut literal = String::new();
            while let Some(&(_, d)) = chars.peek() {
                let exponent_sign =
                    (d == '-' || d == '+') && literal.ends_with(['e', 'E']);
                if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                    literal.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            let value = literal
                .parse()
                .with_context(|| format!("Invalid number '{literal}' at offset {pos}"))?;
            tokens.push(Token::Number(value));
        } else if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            tokens.push(match c {
                '+' | '-' | '*' | '/' | '^' => Token::Op(c),
                '(' => Token::LParen,
                ')' => Token::RParen,
                other => bail!("Unexpected character '{other}' at offset {pos}"),
            });
            chars.next();
        }
    }
    Ok(tokens)
}

/// Parses a string expression into an [`Expr`].
///
/// Grammar, lowest precedence first: `+ -`, `* /`, unary minus, `^`
/// (right associative), then numbers, identifiers, calls and parentheses.
pub fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_sum()?;
    if let Some(token) = parser.peek() {
        bail!("Unexpected trailing token {token:?} in '{input}'");
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_op(&self, ops: &[char]) -> Option<char> {
        match self.peek() {
            Some(Token::Op(c)) if ops.contains(c) => Some(*c),
            _ => None,
        }
    }

    fn parse_sum(&mut self) -> Result<Expr> {
        let mut left = self.parse_product()?;
        while let Some(op) = self.peek_op(&['+', '-']) {
            self.pos += 1;
            let right = self.parse_product()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_product(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek_op(&['*', '/']) {
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.peek_op(&['-']).is_some() {
            self.pos += 1;
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        if self.peek_op(&['+']).is_some() {
            self.pos += 1;
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_primary()?;
        if self.peek_op(&['^']).is_some() {
            self.pos += 1;
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), '^', Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let arg = self.parse_sum()?;
                    self.expect_close()?;
                    Ok(Expr::Call(name, Box::new(arg)))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_sum()?;
                self.expect_close()?;
                Ok(expr)
            }
            Some(token) => bail!("Unexpected token {token:?}"),
            None => bail!("Unexpected end of expression"),
        }
    }

    fn expect_close(&mut self) -> Result<()> {
        match self.next() {
            Some(Token::RParen) => Ok(()),
            _ => bail!("Expected ')'"),
        }
    }
}

// --- EquationSystem ---

/// A `DynamicalSystem` with one compiled expression per state variable.
/// Evaluates over any `Scalar`, so the same system serves both `f64` and
/// `Dual` evaluations.
#[derive(Debug)]
pub struct EquationSystem {
    pub equations: Vec<Bytecode>,
    pub params: Vec<f64>,
    // Scratch stack reused across evaluations; makes the system !Sync.
    stack_f64: RefCell<Vec<f64>>,
    stack_dual: RefCell<Vec<Dual>>,
}

impl EquationSystem {
    pub fn new(equations: Vec<Bytecode>, params: Vec<f64>) -> Self {
        Self {
            equations,
            params,
            stack_f64: RefCell::new(Vec::with_capacity(64)),
            stack_dual: RefCell::new(Vec::with_capacity(64)),
        }
    }

    /// Parses and compiles one equation per state variable.
    pub fn compile(
        equations: &[String],
        var_names: &[String],
        params: Vec<f64>,
        param_names: &[String],
    ) -> Result<Self> {
        if equations.len() != var_names.len() {
            bail!(
                "Expected one equation per variable ({} variables, {} equations).",
                var_names.len(),
                equations.len()
            );
        }
        if params.len() != param_names.len() {
            bail!(
                "Parameter values and names differ in length ({} vs {}).",
                params.len(),
                param_names.len()
            );
        }
        let compiler = Compiler::new(var_names, param_names);
        let bytecodes = equations
            .iter()
            .zip(var_names)
            .map(|(source, var)| {
                parse(source)
                    .and_then(|expr| compiler.compile(&expr))
                    .with_context(|| format!("Failed to compile equation for '{var}': {source}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(bytecodes, params))
    }
}

impl EquationSystem {
    fn evaluate<T: Scalar>(&self, x: &[T], out: &mut [T], stack: &mut Vec<T>) {
        for (slot, eq) in out.iter_mut().zip(&self.equations) {
            *slot = VM::execute(eq, x, &self.params, stack);
        }
    }
}

impl DynamicalSystem<f64> for EquationSystem {
    fn dimension(&self) -> usize {
        self.equations.len()
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        self.evaluate(x, out, &mut self.stack_f64.borrow_mut());
    }
}

impl DynamicalSystem<Dual> for EquationSystem {
    fn dimension(&self) -> usize {
        self.equations.len()
    }

    fn apply(&self, _t: Dual, x: &[Dual], out: &mut [Dual]) {
        self.evaluate(x, out, &mut self.stack_dual.borrow_mut());
    }
}
