//! a module turns a formula string into a symbolic expression
//!
//! Formulas follow a small closed grammar (Python-like operator precedence):
//! ```text
//! expression := term (('+' | '-') term)*
//! term       := unary (('*' | '/') unary)*
//! unary      := '-' unary | power
//! power      := postfix ('**' unary)?
//! postfix    := atom ( '(' args ')' | '[' expression ']' | '.' name )*
//! atom       := number | string | name | '(' expression ')'
//! ```
//! Parsing goes in two passes. nom builds a syntax tree of everything that looks like an
//! expression; the tree is then checked node by node and turned into [`Expr`]. Only `x`,
//! `p[<literal>]`, numbers and one-argument calls of `fac`, `exp`, `sin` survive the check,
//! so nothing but arithmetic is reachable from a formula.
//!
//!# Example
//! ```
//! use RustedSITforC::symbolic::parse_expr::parse_formula;
//! use RustedSITforC::symbolic::symbolic_engine::ParamMap;
//! let formula = parse_formula(r#"p["k"] * (1 - exp(-x / p["t"]))"#).unwrap();
//! assert_eq!(formula.params(), &["k".to_string(), "t".to_string()]);
//! let params = ParamMap::from([("k".to_string(), 2.0), ("t".to_string(), 1.0)]);
//! let f = formula.lambdify();
//! assert!((f(0.0, &params).unwrap()).abs() < 1e-12);
//! ```
use crate::symbolic::symbolic_engine::{BinOp, EvalError, Expr, Func, Notation, ParamMap};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1, multispace0, one_of},
    combinator::{map, not, opt, recognize, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("empty formula")]
    Empty,
    #[error("malformed formula near `{0}`")]
    Syntax(String),
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),
    #[error("call of `{0}` is not allowed")]
    UnknownFunction(String),
    #[error("function `{0}` must be called")]
    BareFunction(String),
    #[error("`{func}` takes exactly one argument, {found} given")]
    WrongArity { func: String, found: usize },
    #[error("`{0}` cannot be called")]
    NotCallable(String),
    #[error("`{0}` cannot be subscripted, parameters are referenced as p[key]")]
    NotSubscriptable(String),
    #[error("parameter key `{0}` must be a string or number literal")]
    NonLiteralKey(String),
    #[error("`p` must be subscripted with a key")]
    BareParameterTable,
    #[error("attribute access `.{0}` is not allowed")]
    AttributeAccess(String),
    #[error("operator `{0}` is not supported")]
    UnsupportedOperator(String),
    #[error("string literal \"{0}\" is only allowed as a parameter key")]
    StringLiteral(String),
}

/// Syntax tree as written, before whitelisting
#[derive(Debug, Clone, PartialEq)]
enum Syntax<'a> {
    Number(&'a str),
    Str(&'a str),
    Name(&'a str),
    Call(Box<Syntax<'a>>, Vec<Syntax<'a>>),
    Subscript(Box<Syntax<'a>>, Box<Syntax<'a>>),
    Attribute(Box<Syntax<'a>>, &'a str),
    Binary(BinOp, Box<Syntax<'a>>, Box<Syntax<'a>>),
    Neg(Box<Syntax<'a>>),
    Pos(Box<Syntax<'a>>),
}

impl fmt::Display for Syntax<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Syntax::Number(text) | Syntax::Name(text) => write!(f, "{}", text),
            Syntax::Str(text) => write!(f, "\"{}\"", text),
            Syntax::Call(target, args) => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", target, args.join(", "))
            }
            Syntax::Subscript(target, key) => write!(f, "{}[{}]", target, key),
            Syntax::Attribute(target, name) => write!(f, "{}.{}", target, name),
            Syntax::Binary(op, lhs, rhs) => {
                let op = match op {
                    BinOp::Add => "+",
                    BinOp::Sub => "-",
                    BinOp::Mul => "*",
                    BinOp::Div => "/",
                    BinOp::Pow => "**",
                };
                write!(f, "({} {} {})", lhs, op, rhs)
            }
            Syntax::Neg(arg) => write!(f, "-{}", arg),
            Syntax::Pos(arg) => write!(f, "+{}", arg),
        }
    }
}

enum Trailer<'a> {
    Call(Vec<Syntax<'a>>),
    Index(Syntax<'a>),
    Attribute(&'a str),
}

/// wraps a parser so that it skips surrounding whitespace
fn ws<'a, O, P>(inner: P) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    P: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

fn number(input: &str) -> IResult<&str, Syntax<'_>> {
    let mantissa = alt((
        recognize((digit1, opt((char('.'), digit0)))),
        recognize((char('.'), digit1)),
    ));
    let exponent = opt((one_of("eE"), opt(one_of("+-")), digit1));
    map(recognize((mantissa, exponent)), Syntax::Number).parse(input)
}

fn string_literal(input: &str) -> IResult<&str, Syntax<'_>> {
    map(
        alt((
            delimited(char('"'), take_while(|c: char| c != '"'), char('"')),
            delimited(char('\''), take_while(|c: char| c != '\''), char('\'')),
        )),
        Syntax::Str,
    )
    .parse(input)
}

fn atom(input: &str) -> IResult<&str, Syntax<'_>> {
    ws(alt((
        number,
        string_literal,
        map(identifier, Syntax::Name),
        delimited(char('('), expression, char(')')),
    )))
    .parse(input)
}

fn trailer(input: &str) -> IResult<&str, Trailer<'_>> {
    alt((
        map(
            delimited(
                ws(char('(')),
                separated_list0(char(','), expression),
                ws(char(')')),
            ),
            Trailer::Call,
        ),
        map(
            delimited(ws(char('[')), expression, ws(char(']'))),
            Trailer::Index,
        ),
        map(preceded(ws(char('.')), identifier), Trailer::Attribute),
    ))
    .parse(input)
}

fn postfix(input: &str) -> IResult<&str, Syntax<'_>> {
    let (input, base) = atom(input)?;
    let (input, trailers) = many0(trailer).parse(input)?;
    let node = trailers.into_iter().fold(base, |node, trailer| match trailer {
        Trailer::Call(args) => Syntax::Call(Box::new(node), args),
        Trailer::Index(key) => Syntax::Subscript(Box::new(node), Box::new(key)),
        Trailer::Attribute(name) => Syntax::Attribute(Box::new(node), name),
    });
    Ok((input, node))
}

// '**' is right-associative and binds tighter than unary minus on its left
fn power(input: &str) -> IResult<&str, Syntax<'_>> {
    let (input, base) = postfix(input)?;
    let (input, exponent) = opt(preceded(ws(tag("**")), unary)).parse(input)?;
    let node = match exponent {
        Some(exponent) => Syntax::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)),
        None => base,
    };
    Ok((input, node))
}

fn unary(input: &str) -> IResult<&str, Syntax<'_>> {
    alt((
        map(preceded(ws(char('-')), unary), |arg| Syntax::Neg(Box::new(arg))),
        map(preceded(ws(char('+')), unary), |arg| Syntax::Pos(Box::new(arg))),
        power,
    ))
    .parse(input)
}

fn fold_binary<'a>(first: Syntax<'a>, rest: Vec<(BinOp, Syntax<'a>)>) -> Syntax<'a> {
    rest.into_iter().fold(first, |lhs, (op, rhs)| {
        Syntax::Binary(op, Box::new(lhs), Box::new(rhs))
    })
}

fn term(input: &str) -> IResult<&str, Syntax<'_>> {
    let (input, first) = unary(input)?;
    let operator = ws(alt((
        value(BinOp::Mul, terminated(char('*'), not(char('*')))),
        value(BinOp::Div, terminated(char('/'), not(char('/')))),
    )));
    let (input, rest) = many0(pair(operator, unary)).parse(input)?;
    Ok((input, fold_binary(first, rest)))
}

fn expression(input: &str) -> IResult<&str, Syntax<'_>> {
    let (input, first) = term(input)?;
    let operator = ws(alt((
        value(BinOp::Add, char('+')),
        value(BinOp::Sub, char('-')),
    )));
    let (input, rest) = many0(pair(operator, term)).parse(input)?;
    Ok((input, fold_binary(first, rest)))
}

/// Turns a syntax tree into an expression, rejecting everything outside the whitelist.
fn validate(node: &Syntax) -> Result<Expr, ParseError> {
    match node {
        Syntax::Number(text) => text
            .parse::<f64>()
            .map(Expr::Const)
            .map_err(|_| ParseError::Syntax(text.to_string())),
        Syntax::Str(text) => Err(ParseError::StringLiteral(text.to_string())),
        Syntax::Name("x") => Ok(Expr::Var),
        Syntax::Name("p") => Err(ParseError::BareParameterTable),
        Syntax::Name(name) if Func::from_formula_name(name).is_some() => {
            Err(ParseError::BareFunction(name.to_string()))
        }
        Syntax::Name(name) => Err(ParseError::UnknownIdentifier(name.to_string())),
        Syntax::Call(target, args) => match target.as_ref() {
            Syntax::Name(name) => {
                let func = Func::from_formula_name(name)
                    .ok_or_else(|| ParseError::UnknownFunction(name.to_string()))?;
                match args.as_slice() {
                    [arg] => Ok(Expr::call(func, validate(arg)?)),
                    _ => Err(ParseError::WrongArity {
                        func: name.to_string(),
                        found: args.len(),
                    }),
                }
            }
            other => {
                validate(other)?;
                Err(ParseError::NotCallable(other.to_string()))
            }
        },
        Syntax::Subscript(target, key) => match (target.as_ref(), key.as_ref()) {
            (Syntax::Name("p"), Syntax::Str(key)) => Ok(Expr::Param(key.to_string())),
            (Syntax::Name("p"), Syntax::Number(key)) => Ok(Expr::Param(key.to_string())),
            (Syntax::Name("p"), other) => Err(ParseError::NonLiteralKey(other.to_string())),
            (other, _) => Err(ParseError::NotSubscriptable(other.to_string())),
        },
        Syntax::Attribute(target, name) => {
            validate(target)?;
            Err(ParseError::AttributeAccess(name.to_string()))
        }
        Syntax::Binary(op, lhs, rhs) => Ok(Expr::Binary(
            *op,
            validate(lhs)?.boxed(),
            validate(rhs)?.boxed(),
        )),
        Syntax::Neg(arg) => Ok(-validate(arg)?),
        Syntax::Pos(_) => Err(ParseError::UnsupportedOperator("unary +".to_string())),
    }
}

/// A checked formula: its expression tree, its rendering and the parameters it references.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedFormula {
    source: String,
    expr: Expr,
    rendering: String,
    params: Vec<String>,
}

impl ParsedFormula {
    /// formula text as given
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// plain-text rendering, e.g. `(2 + 3)`
    pub fn rendering(&self) -> &str {
        &self.rendering
    }

    pub fn latex(&self) -> String {
        self.expr.render(Notation::Latex)
    }

    /// referenced parameter keys, each once, in order of first appearance
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn eval(&self, x: f64, params: &ParamMap) -> Result<f64, EvalError> {
        self.expr.eval(x, params)
    }

    /// numeric function f(x, params)
    pub fn lambdify(&self) -> impl Fn(f64, &ParamMap) -> Result<f64, EvalError> + '_ {
        move |x, params| self.expr.eval(x, params)
    }
}

impl fmt::Display for ParsedFormula {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.rendering)
    }
}

/// Parses and checks a formula.
pub fn parse_formula(formula: &str) -> Result<ParsedFormula, ParseError> {
    let source = formula.trim();
    if source.is_empty() {
        return Err(ParseError::Empty);
    }
    let tree = match expression(source) {
        Ok((rest, tree)) if rest.trim().is_empty() => tree,
        Ok((rest, _)) => return Err(ParseError::Syntax(rest.trim().to_string())),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(ParseError::Syntax(e.input.trim().to_string()));
        }
        Err(nom::Err::Incomplete(_)) => return Err(ParseError::Syntax(source.to_string())),
    };
    let expr = validate(&tree)?;
    let (rendering, params) = expr.render_with_params(Notation::Plain);
    Ok(ParsedFormula {
        source: source.to_string(),
        expr,
        rendering,
        params,
    })
}

impl Expr {
    /// Parses a formula into its expression tree
    pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
        Ok(parse_formula(input)?.expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(formula: &str) -> String {
        parse_formula(formula).unwrap().rendering().to_string()
    }

    #[test]
    fn test_parse_constant_and_variable() {
        assert_eq!(Expr::parse_expression("2.5").unwrap(), Expr::Const(2.5));
        assert_eq!(Expr::parse_expression(" x ").unwrap(), Expr::Var);
        assert_eq!(Expr::parse_expression("1e-3").unwrap(), Expr::Const(1e-3));
        assert_eq!(Expr::parse_expression(".5").unwrap(), Expr::Const(0.5));
    }

    #[test]
    fn test_precedence() {
        // 2 + 3 * 4 = 14, -2 ** 2 = -4, 2 ** 3 ** 2 = 512
        let params = ParamMap::new();
        let eval = |s: &str| parse_formula(s).unwrap().eval(0.0, &params).unwrap();
        assert_eq!(eval("2 + 3 * 4"), 14.0);
        assert_eq!(eval("-2 ** 2"), -4.0);
        assert_eq!(eval("2 ** 3 ** 2"), 512.0);
        assert_eq!(eval("2 ** -1"), 0.5);
        assert_eq!(eval("8 / 4 / 2"), 1.0);
        assert_eq!(eval("10 - 4 - 3"), 3.0);
    }

    #[test]
    fn test_rendering_literals() {
        assert_eq!(render("2 + 3"), "(2 + 3)");
        assert_eq!(render("2 / 3"), "2/3");
        assert_eq!(render("2 ** 3"), "(2)^3");
        assert_eq!(render("-(x)"), "-(x)");
        assert_eq!(render("exp(2)"), "e^2");
        assert_eq!(render("fac(x)"), "x!");
        assert_eq!(render("2 - 3"), "(2 - 3)");
        assert_eq!(render("2 * x"), "2 · x");
        assert_eq!(render("sin(x)"), "sin(x)");
    }

    #[test]
    fn test_latex_rendering() {
        let formula = parse_formula("2 / 3 * exp(x)").unwrap();
        assert_eq!(formula.latex(), "$\\frac{2}{3} \\cdot \\mathrm{e}^{x}$");
        let formula = parse_formula("sin(x) ** 2 + fac(3)").unwrap();
        assert_eq!(formula.latex(), "$((\\sin{x})^{2} + 3\\mathrm{!})$");
    }

    #[test]
    fn test_parameter_discovery() {
        let formula = parse_formula(r#"p["dx"]"#).unwrap();
        assert_eq!(formula.params(), &["dx".to_string()]);
        let formula = parse_formula(r#"p["t1"] + p["t2"] + p["t3"]"#).unwrap();
        assert_eq!(
            formula.params(),
            &["t1".to_string(), "t2".to_string(), "t3".to_string()]
        );
        let formula = parse_formula(r#"p['k'] * x + p["k"] ** 2 - p[1]"#).unwrap();
        assert_eq!(formula.params(), &["k".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_rejects_unknown_identifiers() {
        assert_eq!(
            parse_formula("2 * x + 3 * y"),
            Err(ParseError::UnknownIdentifier("y".to_string()))
        );
        assert_eq!(parse_formula("p"), Err(ParseError::BareParameterTable));
        assert_eq!(
            parse_formula("exp + 1"),
            Err(ParseError::BareFunction("exp".to_string()))
        );
    }

    #[test]
    fn test_rejects_disallowed_calls() {
        assert_eq!(
            parse_formula("open('/etc/passwd').read()"),
            Err(ParseError::UnknownFunction("open".to_string()))
        );
        assert_eq!(
            parse_formula("__import__('os')"),
            Err(ParseError::UnknownFunction("__import__".to_string()))
        );
        assert_eq!(
            parse_formula("exp(1, 2)"),
            Err(ParseError::WrongArity {
                func: "exp".to_string(),
                found: 2
            })
        );
        assert!(matches!(
            parse_formula("sin()"),
            Err(ParseError::WrongArity { found: 0, .. })
        ));
        assert!(matches!(
            parse_formula("x.real"),
            Err(ParseError::AttributeAccess(_))
        ));
        assert!(matches!(
            parse_formula("(x + 1)(2)"),
            Err(ParseError::NotCallable(_))
        ));
    }

    #[test]
    fn test_rejects_bad_subscripts() {
        assert_eq!(
            parse_formula("t['a']"),
            Err(ParseError::NotSubscriptable("t".to_string()))
        );
        assert!(matches!(
            parse_formula("p[x]"),
            Err(ParseError::NonLiteralKey(_))
        ));
        assert!(matches!(
            parse_formula("'abc' + 1"),
            Err(ParseError::StringLiteral(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_syntax() {
        assert_eq!(parse_formula("   "), Err(ParseError::Empty));
        assert_eq!(parse_formula("2 +"), Err(ParseError::Syntax("+".to_string())));
        assert!(matches!(parse_formula("(x + 1"), Err(ParseError::Syntax(_))));
        assert!(matches!(parse_formula("x // 2"), Err(ParseError::Syntax(_))));
        assert!(matches!(parse_formula("2x"), Err(ParseError::Syntax(_))));
        assert!(matches!(
            parse_formula("+x"),
            Err(ParseError::UnsupportedOperator(_))
        ));
    }
}
