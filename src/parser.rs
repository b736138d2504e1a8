//! Formula parser using nom.
//!
//! Turns user-typed formulas into serialized expression trees:
//!
//! ```text
//! SepalLengthCm > 5 AND Species = 'setosa'
//!
//! {"operator": "AND", "args": [
//!     {"operator": ">", "args": [{"name": "SepalLengthCm"}, {"literal": 5}]},
//!     {"operator": "=", "args": [{"name": "Species"}, {"literal": "setosa"}]}
//! ]}
//! ```
//!
//! Operators come from an [`OperatorTable`]. Binary operators with a higher
//! precedence bind tighter and equal precedences associate to the left.
//! Unary operators bind to the term that immediately follows them.

use std::collections::{BTreeMap, BTreeSet};

use nom::{
    branch::alt,
    bytes::complete::take_while,
    character::complete::{char, digit0, digit1, multispace0, one_of, satisfy},
    combinator::{opt, recognize},
    error::{ErrorKind, ParseError},
    sequence::{pair, tuple},
    IResult,
};

use crate::ast::{Expr, ExprTree, Value};
use crate::error::{WeaveError, WeaveResult};

/// Parse failure carrying the remaining input, from which the position is derived.
#[derive(Debug)]
struct Failure<'a> {
    input: &'a str,
    message: String,
}

impl<'a> Failure<'a> {
    fn new(input: &'a str, message: impl Into<String>) -> Self {
        Self {
            input,
            message: message.into(),
        }
    }
}

impl<'a> ParseError<&'a str> for Failure<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        Self::new(input, format!("unexpected input ({:?})", kind))
    }

    fn append(_: &'a str, _: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, T> = IResult<&'a str, T, Failure<'a>>;

fn fail<'a, T>(input: &'a str, message: impl Into<String>) -> PResult<'a, T> {
    Err(nom::Err::Failure(Failure::new(input, message)))
}

/// Binary operators with their precedence, and the unary operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorTable {
    binary: BTreeMap<String, u8>,
    unary: BTreeSet<String>,
}

impl Default for OperatorTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.add_binary("OR", 1);
        table.add_binary("AND", 2);
        for op in ["=", "==", "!=", "<>", "<", "<=", ">", ">=", "LIKE"] {
            table.add_binary(op, 3);
        }
        for op in ["+", "-", "||"] {
            table.add_binary(op, 4);
        }
        for op in ["*", "/", "%"] {
            table.add_binary(op, 5);
        }
        table.add_unary("NOT");
        table.add_unary("-");
        table
    }
}

impl OperatorTable {
    pub fn empty() -> Self {
        Self {
            binary: BTreeMap::new(),
            unary: BTreeSet::new(),
        }
    }

    /// Word operators (`and`, `Like`) are stored upper-case.
    pub fn add_binary(&mut self, op: &str, precedence: u8) {
        self.binary.insert(canonical(op), precedence);
    }

    pub fn add_unary(&mut self, op: &str) {
        self.unary.insert(canonical(op));
    }

    pub fn precedence(&self, op: &str) -> Option<u8> {
        self.binary.get(&canonical(op)).copied()
    }

    pub fn is_unary(&self, op: &str) -> bool {
        self.unary.contains(&canonical(op))
    }

    fn is_word_operator(&self, word: &str) -> bool {
        let word = word.to_uppercase();
        self.binary.contains_key(&word) || self.unary.contains(&word)
    }

    /// Distinct precedences, lowest first.
    fn levels(&self) -> Vec<u8> {
        let levels: BTreeSet<u8> = self.binary.values().copied().collect();
        levels.into_iter().collect()
    }
}

fn is_word(op: &str) -> bool {
    op.chars().all(|c| c.is_alphabetic())
}

fn canonical(op: &str) -> String {
    if is_word(op) {
        op.to_uppercase()
    } else {
        op.to_string()
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Remaining input after `op`, if `input` starts with it.
fn strip_operator<'a>(input: &'a str, op: &str) -> Option<&'a str> {
    let head = input.get(..op.len())?;
    if is_word(op) {
        let rest = &input[op.len()..];
        let boundary = !rest.starts_with(is_ident_char);
        (head.eq_ignore_ascii_case(op) && boundary).then_some(rest)
    } else {
        (head == op).then_some(&input[op.len()..])
    }
}

/// Longest operator of `ops` at the start of `input`.
fn longest_match<'a, 'o>(
    input: &'a str,
    ops: impl Iterator<Item = &'o String>,
) -> Option<(&'a str, &'o String)> {
    ops.filter_map(|op| strip_operator(input, op).map(|rest| (rest, op)))
        .max_by_key(|(_, op)| op.len())
}

fn ws<'a>(input: &'a str) -> PResult<'a, &'a str> {
    multispace0(input)
}

fn punct<'a>(c: char) -> impl Fn(&'a str) -> PResult<'a, char> {
    char(c)
}

fn identifier<'a>(input: &'a str) -> PResult<'a, &'a str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(input)
}

fn number_text<'a>(input: &'a str) -> PResult<'a, &'a str> {
    recognize(tuple((
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)
}

fn number<'a>(input: &'a str) -> PResult<'a, Value> {
    let (rest, text) = number_text(input)?;

    if rest.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        return fail(input, "invalid number");
    }

    let is_integer = !text.contains(['.', 'e', 'E']);
    let integer = if is_integer {
        text.parse::<i64>()
            .map(Value::Int)
            .or_else(|_| text.parse::<u64>().map(Value::UInt))
            .ok()
    } else {
        None
    };
    let value = match integer {
        Some(value) => value,
        None => match text.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => return fail(input, "invalid number"),
        },
    };
    Ok((rest, value))
}

fn quoted<'a>(input: &'a str) -> PResult<'a, &'a str> {
    let (rest, quote) = one_of::<&'a str, &str, Failure<'a>>("'\"")(input)?;
    match rest.find(quote) {
        Some(end) => Ok((&rest[end + 1..], &rest[..end])),
        None => fail(input, "unterminated string"),
    }
}

/// One or more adjacent quoted strings, concatenated.
fn string_literal<'a>(input: &'a str) -> PResult<'a, String> {
    let (mut input, first) = quoted(input)?;
    let mut text = first.to_string();
    loop {
        let (rest, _) = ws(input)?;
        match quoted(rest) {
            Ok((rest, next)) => {
                text.push_str(next);
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, text)),
            Err(e) => return Err(e),
        }
    }
}

/// Parses formulas against an [`OperatorTable`].
#[derive(Debug, Clone)]
pub struct ExpressionParser {
    table: OperatorTable,
    levels: Vec<u8>,
}

impl Default for ExpressionParser {
    fn default() -> Self {
        Self::new(OperatorTable::default())
    }
}

impl ExpressionParser {
    pub fn new(table: OperatorTable) -> Self {
        let levels = table.levels();
        Self { table, levels }
    }

    pub fn operators(&self) -> &OperatorTable {
        &self.table
    }

    /// Parse a formula into a serialized expression tree.
    pub fn parse(&self, input: &str) -> WeaveResult<ExprTree> {
        let position = |rest: &str| input.len() - rest.len();
        match self.binary(input, 0) {
            Ok((rest, tree)) => {
                let rest = rest.trim_start();
                if rest.is_empty() {
                    Ok(tree)
                } else {
                    Err(WeaveError::parse(
                        position(rest),
                        format!("operator expected before '{}'", rest),
                    ))
                }
            }
            Err(nom::Err::Error(f)) | Err(nom::Err::Failure(f)) => {
                Err(WeaveError::parse(position(f.input), f.message))
            }
            Err(nom::Err::Incomplete(_)) => {
                Err(WeaveError::parse(input.len(), "incomplete input"))
            }
        }
    }

    /// Parse a formula straight to an expression.
    pub fn parse_expr(&self, input: &str) -> WeaveResult<Expr> {
        self.parse(input)?.to_expr()
    }

    /// Operators at `levels[level]` and tighter.
    fn binary<'a>(&self, input: &'a str, level: usize) -> PResult<'a, ExprTree> {
        let Some(&precedence) = self.levels.get(level) else {
            return self.unary(input);
        };

        let (mut input, mut lhs) = self.binary(input, level + 1)?;
        loop {
            let (rest, _) = ws(input)?;
            let Some((after, op)) = longest_match(rest, self.table.binary.keys()) else {
                return Ok((input, lhs));
            };
            if self.table.binary[op] != precedence {
                return Ok((input, lhs));
            }
            let (after, rhs) = self.binary(after, level + 1)?;
            lhs = ExprTree::operator(op.as_str(), vec![lhs, rhs]);
            input = after;
        }
    }

    fn unary<'a>(&self, input: &'a str) -> PResult<'a, ExprTree> {
        let (input, _) = ws(input)?;
        let Some((rest, op)) = longest_match(input, self.table.unary.iter()) else {
            return self.primary(input);
        };

        let (rest, operand) = self.unary(rest)?;
        let tree = match operand {
            ExprTree::Literal { literal } if op == "-" && literal.is_numeric() => ExprTree::Literal {
                literal: literal.negated(),
            },
            operand => ExprTree::operator(op.as_str(), vec![operand]),
        };
        Ok((rest, tree))
    }

    fn primary<'a>(&self, input: &'a str) -> PResult<'a, ExprTree> {
        let (input, _) = ws(input)?;

        if let Ok((rest, _)) = punct('(')(input) {
            let (rest, inner) = self.binary(rest, 0)?;
            let (rest, _) = ws(rest)?;
            return match punct(')')(rest) {
                Ok((rest, _)) => Ok((rest, inner)),
                Err(_) => fail(rest, "')' expected"),
            };
        }

        match string_literal(input) {
            Ok((rest, text)) => return Ok((rest, ExprTree::literal(text))),
            Err(nom::Err::Error(_)) => {}
            Err(e) => return Err(e),
        }

        match number(input) {
            Ok((rest, value)) => return Ok((rest, ExprTree::literal(value))),
            Err(nom::Err::Error(_)) => {}
            Err(e) => return Err(e),
        }

        if let Ok((rest, name)) = identifier(input) {
            if self.table.is_word_operator(name) {
                return fail(input, format!("operator '{}' unexpected", name));
            }
            let (after_ws, _) = ws(rest)?;
            if let Ok((args_input, _)) = punct('(')(after_ws) {
                return self.call(args_input, name);
            }
            return Ok((rest, ExprTree::name(name)));
        }

        if input.is_empty() {
            fail(input, "expression expected")
        } else {
            fail(input, format!("expression expected at '{}'", input))
        }
    }

    /// Arguments of `name(...)`; `input` starts just after the open parenthesis.
    fn call<'a>(&self, input: &'a str, name: &str) -> PResult<'a, ExprTree> {
        let (input, _) = ws(input)?;
        if let Ok((rest, _)) = punct(')')(input) {
            return Ok((rest, ExprTree::function(name, Vec::new())));
        }

        let mut args = Vec::new();
        let mut input = input;
        loop {
            let (rest, arg) = self.binary(input, 0)?;
            args.push(arg);
            let (rest, _) = ws(rest)?;
            if let Ok((rest, _)) = punct(',')(rest) {
                input = rest;
            } else if let Ok((rest, _)) = punct(')')(rest) {
                return Ok((rest, ExprTree::function(name, args)));
            } else {
                return fail(rest, "',' or ')' expected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::ToSql;

    fn parse(s: &str) -> ExprTree {
        ExpressionParser::default().parse(s).unwrap()
    }

    fn sql(s: &str) -> String {
        ExpressionParser::default().parse_expr(s).unwrap().to_sql()
    }

    fn error_position(s: &str) -> usize {
        match ExpressionParser::default().parse(s) {
            Err(WeaveError::Parse { position, .. }) => position,
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_name_and_literals() {
        assert_eq!(parse("Species"), ExprTree::name("Species"));
        assert_eq!(parse("42"), ExprTree::literal(42));
        assert_eq!(parse("4.5"), ExprTree::literal(4.5));
        assert_eq!(parse("1e3"), ExprTree::literal(1000.0));
        assert_eq!(parse("'setosa'"), ExprTree::literal("setosa"));
        assert_eq!(parse("\"it's\""), ExprTree::literal("it's"));
    }

    #[test]
    fn test_adjacent_strings_concatenate() {
        assert_eq!(parse("'ab' \"cd\""), ExprTree::literal("abcd"));
    }

    #[test]
    fn test_comparison() {
        assert_eq!(
            parse("SepalLengthCm > 5"),
            ExprTree::operator(
                ">",
                vec![ExprTree::name("SepalLengthCm"), ExprTree::literal(5)]
            )
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(sql("a + b * c"), "( a + ( b * c ) )");
        assert_eq!(sql("(a + b) * c"), "( ( a + b ) * c )");
        assert_eq!(
            sql("x > 1 and y < 2 or z = 3"),
            "( ( ( x > 1 ) AND ( y < 2 ) ) OR ( z = 3 ) )"
        );
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(sql("a - b - c"), "( ( a - b ) - c )");
        assert_eq!(sql("a / b * c"), "( ( a / b ) * c )");
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(sql("a <= 1"), "( a <= 1 )");
        assert_eq!(sql("a <> 1"), "( a <> 1 )");
        assert_eq!(sql("a || 'x'"), "( a || 'x' )");
    }

    #[test]
    fn test_word_operators_need_a_boundary() {
        // `order` and `android` are names, not OR/AND
        assert_eq!(sql("order = android"), "( order = android )");
        assert_eq!(sql("a like 'x%'"), "( a LIKE 'x%' )");
    }

    #[test]
    fn test_unary() {
        assert_eq!(sql("NOT flag"), "( NOT flag )");
        assert_eq!(sql("-delta"), "( - delta )");
        assert_eq!(parse("-5"), ExprTree::literal(-5));
        assert_eq!(sql("3 - -2.5"), "( 3 - -2.5 )");
        // unary binds to the following term only
        assert_eq!(sql("not a = b"), "( ( NOT a ) = b )");
    }

    #[test]
    fn test_function_calls() {
        assert_eq!(sql("random()"), "random()");
        assert_eq!(sql("ROUND(a * 2, 1)"), "ROUND(( a * 2 ), 1)");
        assert_eq!(sql("coalesce (a, lower(b), 'x')"), "coalesce(a, lower(b), 'x')");
    }

    #[test]
    fn test_dotted_names() {
        assert_eq!(parse("t.col"), ExprTree::name("t.col"));
    }

    #[test]
    fn test_errors_carry_positions() {
        assert_eq!(error_position(""), 0);
        assert_eq!(error_position("a > "), 4);
        assert_eq!(error_position("a = 'open"), 4);
        assert_eq!(error_position("a b"), 2);
        assert_eq!(error_position("f(a b)"), 4);
        assert_eq!(error_position("(a + 1"), 6);
        assert_eq!(error_position("12ab"), 0);
        assert_eq!(error_position("a > AND"), 4);
        assert_eq!(error_position("a > 1e400"), 4);
    }

    #[test]
    fn test_number_range() {
        assert_eq!(parse("18446744073709551615"), ExprTree::literal(Value::UInt(u64::MAX)));
        assert_eq!(parse("-9223372036854775808"), ExprTree::literal(i64::MIN));
        assert!(matches!(
            ExpressionParser::default().parse("1e400"),
            Err(WeaveError::Parse { message, .. }) if message == "invalid number"
        ));
    }

    #[test]
    fn test_custom_table() {
        let mut table = OperatorTable::default();
        table.add_binary("^", 6);
        let parser = ExpressionParser::new(table);
        let tree = parser.parse_expr("a * b ^ 2").unwrap();
        assert_eq!(tree.to_sql(), "( a * ( b ^ 2 ) )");
    }

    #[test]
    fn test_operator_lookup_is_case_insensitive() {
        let table = OperatorTable::default();
        assert_eq!(table.precedence("and"), Some(2));
        assert_eq!(table.precedence("*"), Some(5));
        assert!(table.is_unary("not"));
        assert_eq!(table.precedence("^"), None);
    }
}
