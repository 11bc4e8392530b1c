//! Script parser
//!
//! Grammar (statements separated by newlines or `;`, `#` starts a comment):
//!
//! ```text
//! statement  := target '=' expr | 'fail' expr | 'loop'
//! target     := 'result' | 'result' '[' string ']' | 'host' '[' string ']'
//! expr       := term (('+' | '-') term)*
//! term       := unary (('*' | '/') unary)*
//! unary      := '-' unary | atom          (nesting capped at MAX_NESTING)
//! atom       := number | string | 'true' | 'false' | 'null' | reference | '(' expr ')'
//! reference  := ('params' | 'result' | 'host') ('[' string ']')?
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace1, one_of, satisfy},
    combinator::{all_consuming, map, map_res, not, opt, recognize, value, verify},
    error::{context, VerboseError, VerboseErrorKind},
    multi::{fold_many0, many0, many0_count, many1_count, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use serde_json::{Number, Value};

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Parsed script
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Located>,
}

/// Statement with the 1-based line it starts on
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub line: usize,
    pub statement: Statement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Assign(Target, Expr),
    Fail(Expr),
    /// Spin forever without returning
    Loop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Result,
    ResultKey(String),
    HostKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Params,
    Param(String),
    Result,
    ResultKey(String),
    HostKey(String),
    Neg(Box<Expr>),
    /// `first op1 e1 op2 e2 ...`, applied left to right
    Chain(Box<Expr>, Vec<(BinaryOp, Expr)>),
}

/// Parse a complete script
pub fn parse_program(input: &str) -> Result<Program, String> {
    match all_consuming(|i| program(i, input))(input) {
        Ok((_, program)) => Ok(program),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(nom::error::convert_error(input, e))
        }
        Err(nom::Err::Incomplete(_)) => Err("Incomplete input".to_string()),
    }
}

fn program<'a>(input: &'a str, original: &'a str) -> Res<'a, Program> {
    let (input, _) = separators(input)?;
    let (input, statements) =
        separated_list0(separator, |i| located_statement(i, original))(input)?;
    let (input, _) = separators(input)?;
    Ok((input, Program { statements }))
}

fn located_statement<'a>(input: &'a str, original: &'a str) -> Res<'a, Located> {
    let offset = original.len() - input.len();
    let line = original[..offset].matches('\n').count() + 1;
    let (input, statement) = statement(input)?;
    Ok((input, Located { line, statement }))
}

// ============================================================================
// Layout
// ============================================================================

/// Horizontal whitespace only; newlines separate statements
fn sp(input: &str) -> Res<'_, &str> {
    take_while(|c: char| c == ' ' || c == '\t')(input)
}

fn comment(input: &str) -> Res<'_, &str> {
    recognize(pair(char('#'), take_while(|c: char| c != '\n')))(input)
}

fn separators(input: &str) -> Res<'_, usize> {
    many0_count(alt((multispace1, comment, tag(";"))))(input)
}

/// At least one newline or `;` between statements
fn separator(input: &str) -> Res<'_, &str> {
    verify(
        recognize(many1_count(alt((multispace1, comment, tag(";"))))),
        |s: &str| s.contains('\n') || s.contains(';'),
    )(input)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> Res<'a, &'a str> {
    terminated(tag(kw), not(satisfy(is_ident_char)))
}

// ============================================================================
// Statements
// ============================================================================

fn statement(input: &str) -> Res<'_, Statement> {
    alt((
        value(Statement::Loop, keyword("loop")),
        map(preceded(pair(keyword("fail"), sp), expr), Statement::Fail),
        assignment,
    ))(input)
}

fn assignment(input: &str) -> Res<'_, Statement> {
    let (input, target) = context("assignment target", target)(input)?;
    let (input, _) = tuple((sp, char('='), not(char('=')), sp))(input)?;
    let (input, expr) = context("expression", expr)(input)?;
    Ok((input, Statement::Assign(target, expr)))
}

fn target(input: &str) -> Res<'_, Target> {
    alt((
        map(preceded(keyword("result"), subscript), Target::ResultKey),
        value(Target::Result, keyword("result")),
        map(preceded(keyword("host"), subscript), Target::HostKey),
    ))(input)
}

fn subscript(input: &str) -> Res<'_, String> {
    delimited(
        pair(sp, char('[')),
        delimited(sp, string_literal, sp),
        char(']'),
    )(input)
}

// ============================================================================
// Expressions
// ============================================================================

/// Deepest allowed nesting of parentheses and unary minus
pub const MAX_NESTING: usize = 64;

fn expr(input: &str) -> Res<'_, Expr> {
    nested_expr(input, 0)
}

fn nested_expr(input: &str, depth: usize) -> Res<'_, Expr> {
    let (input, first) = term(input, depth)?;
    let (input, rest) = many0(pair(
        delimited(sp, binary_op("+-"), sp),
        |i| term(i, depth),
    ))(input)?;
    Ok((input, chain(first, rest)))
}

fn term(input: &str, depth: usize) -> Res<'_, Expr> {
    let (input, first) = unary(input, depth)?;
    let (input, rest) = many0(pair(
        delimited(sp, binary_op("*/"), sp),
        |i| unary(i, depth),
    ))(input)?;
    Ok((input, chain(first, rest)))
}

fn binary_op<'a>(ops: &'static str) -> impl FnMut(&'a str) -> Res<'a, BinaryOp> {
    map(one_of(ops), |op: char| match op {
        '+' => BinaryOp::Add,
        '-' => BinaryOp::Sub,
        '*' => BinaryOp::Mul,
        _ => BinaryOp::Div,
    })
}

/// Operator chains stay flat so their length never adds recursion depth
fn chain(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    if rest.is_empty() {
        first
    } else {
        Expr::Chain(Box::new(first), rest)
    }
}

fn too_deep(input: &str) -> nom::Err<VerboseError<&str>> {
    nom::Err::Failure(VerboseError {
        errors: vec![(
            input,
            VerboseErrorKind::Context("expression nested too deeply"),
        )],
    })
}

fn unary(input: &str, depth: usize) -> Res<'_, Expr> {
    if let Ok((rest, _)) = pair(char::<&str, VerboseError<&str>>('-'), sp)(input) {
        if depth >= MAX_NESTING {
            return Err(too_deep(input));
        }
        let (rest, operand) = unary(rest, depth + 1)?;
        return Ok((rest, Expr::Neg(Box::new(operand))));
    }
    atom(input, depth)
}

fn atom(input: &str, depth: usize) -> Res<'_, Expr> {
    if let Ok((rest, _)) = pair(char::<&str, VerboseError<&str>>('('), sp)(input) {
        if depth >= MAX_NESTING {
            return Err(too_deep(input));
        }
        return terminated(|i| nested_expr(i, depth + 1), pair(sp, char(')')))(rest);
    }
    alt((
        map(number, Expr::Literal),
        map(string_literal, |s| Expr::Literal(Value::String(s))),
        value(Expr::Literal(Value::Bool(true)), keyword("true")),
        value(Expr::Literal(Value::Bool(false)), keyword("false")),
        value(Expr::Literal(Value::Null), keyword("null")),
        reference,
    ))(input)
}

fn reference(input: &str) -> Res<'_, Expr> {
    alt((
        map(preceded(keyword("params"), subscript), Expr::Param),
        value(Expr::Params, keyword("params")),
        map(preceded(keyword("result"), subscript), Expr::ResultKey),
        value(Expr::Result, keyword("result")),
        map(preceded(keyword("host"), subscript), Expr::HostKey),
    ))(input)
}

fn number(input: &str) -> Res<'_, Value> {
    map_res(
        recognize(tuple((
            digit1,
            opt(pair(char('.'), digit1)),
            opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
        ))),
        parse_number,
    )(input)
}

fn parse_number(text: &str) -> Result<Value, String> {
    if !text.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::from(n));
        }
    }
    let f = text.parse::<f64>().map_err(|e| e.to_string())?;
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("number out of range: {}", text))
}

fn string_literal(input: &str) -> Res<'_, String> {
    alt((quoted('\''), quoted('"')))(input)
}

fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> Res<'a, String> {
    move |input: &'a str| {
        delimited(
            char(quote),
            fold_many0(
                alt((escaped_char, satisfy(move |c: char| c != quote && c != '\\'))),
                String::new,
                |mut acc: String, c: char| {
                    acc.push(c);
                    acc
                },
            ),
            char(quote),
        )(input)
    }
}

fn escaped_char(input: &str) -> Res<'_, char> {
    preceded(
        char('\\'),
        alt((
            value('\n', char('n')),
            value('\t', char('t')),
            value('\\', char('\\')),
            value('\'', char('\'')),
            value('"', char('"')),
        )),
    )(input)
}
