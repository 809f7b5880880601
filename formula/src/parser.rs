//! Turns formula text into an [`Expr`] tree using the grammar in
//! `grammar/formula.pest`.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::ast::{BinOp, Expr, UnaryOp};
use crate::error::ParseError;
use crate::position::Position;

#[derive(Parser)]
#[grammar = "grammar/formula.pest"]
struct FormulaGrammar;

/// Parse a formula's text (the part after the leading `=`) into an
/// expression tree. On failure the cell issuing this call leaves its prior
/// content untouched.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut pairs = FormulaGrammar::parse(Rule::formula, input)
        .map_err(|e| ParseError(e.to_string()))?;

    let formula_pair = pairs.next().ok_or_else(|| ParseError("empty formula".into()))?;
    let expr_pair = formula_pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| ParseError("missing expression".into()))?;

    build_expr(expr_pair)
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    debug_assert_eq!(pair.as_rule(), Rule::expr);
    let mut inner = pair.into_inner();
    let mut expr = build_term(inner.next().ok_or_else(|| ParseError("missing term".into()))?)?;

    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_str() {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            other => return Err(ParseError(format!("unexpected operator {other:?}"))),
        };
        let rhs_pair = inner.next().ok_or_else(|| ParseError("dangling operator".into()))?;
        let rhs = build_term(rhs_pair)?;
        expr = Expr::Binary { op, left: Box::new(expr), right: Box::new(rhs) };
    }

    Ok(expr)
}

fn build_term(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    debug_assert_eq!(pair.as_rule(), Rule::term);
    let mut inner = pair.into_inner();
    let mut expr = build_factor(inner.next().ok_or_else(|| ParseError("missing factor".into()))?)?;

    while let Some(op_pair) = inner.next() {
        let op = match op_pair.as_str() {
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            other => return Err(ParseError(format!("unexpected operator {other:?}"))),
        };
        let rhs_pair = inner.next().ok_or_else(|| ParseError("dangling operator".into()))?;
        let rhs = build_factor(rhs_pair)?;
        expr = Expr::Binary { op, left: Box::new(expr), right: Box::new(rhs) };
    }

    Ok(expr)
}

fn build_factor(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    debug_assert_eq!(pair.as_rule(), Rule::factor);
    let mut ops = Vec::new();
    let mut atom_pair = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::unary_op => ops.push(match p.as_str() {
                "+" => UnaryOp::Plus,
                "-" => UnaryOp::Minus,
                other => return Err(ParseError(format!("unexpected unary operator {other:?}"))),
            }),
            Rule::atom => atom_pair = Some(p),
            _ => unreachable!("factor only contains unary_op*/atom"),
        }
    }

    let mut expr = build_atom(atom_pair.ok_or_else(|| ParseError("missing atom".into()))?)?;
    for op in ops.into_iter().rev() {
        expr = Expr::Unary { op, operand: Box::new(expr) };
    }
    Ok(expr)
}

fn build_atom(pair: Pair<Rule>) -> Result<Expr, ParseError> {
    debug_assert_eq!(pair.as_rule(), Rule::atom);
    let inner = pair.into_inner().next().ok_or_else(|| ParseError("empty atom".into()))?;
    match inner.as_rule() {
        Rule::number => {
            let n: f64 = inner
                .as_str()
                .parse()
                .map_err(|_| ParseError(format!("invalid number literal {:?}", inner.as_str())))?;
            Ok(Expr::Number(n))
        }
        Rule::cell_ref => {
            let text = inner.as_str().to_ascii_uppercase();
            let pos = Position::from_a1(&text)
                .ok_or_else(|| ParseError(format!("invalid cell reference {text:?}")))?;
            Ok(Expr::Ref(pos))
        }
        Rule::expr => build_expr(inner),
        other => Err(ParseError(format!("unexpected atom rule {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &Expr) -> f64 {
        expr.evaluate(&mut |_| Ok(0.0)).unwrap()
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let expr = parse("1 + 2 * 3").unwrap();
        assert_eq!(eval(&expr), 7.0);
    }

    #[test]
    fn parses_parentheses() {
        let expr = parse("(1 + 2) * 3").unwrap();
        assert_eq!(eval(&expr), 9.0);
    }

    #[test]
    fn parses_unary_minus() {
        let expr = parse("-3 + 5").unwrap();
        assert_eq!(eval(&expr), 2.0);
    }

    #[test]
    fn parses_cell_reference() {
        let expr = parse("B2+3").unwrap();
        assert_eq!(expr.referenced_cells(), vec![Position::new(1, 1)]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("1 +").is_err());
        assert!(parse("").is_err());
        assert!(parse("1 2").is_err());
    }

    #[test]
    fn pretty_print_is_idempotent() {
        let expr = parse("A1+B2*(C3-4)").unwrap();
        let printed = expr.pretty_print();
        let reparsed = parse(&printed).unwrap();
        assert_eq!(reparsed.pretty_print(), printed);
    }
}
