//! Typed where-expressions for store queries.
//!
//! Component queries are built as a [`Filter`] tree rather than a string, so
//! the renderer never concatenates user input into a query. A `where`
//! attribute written by a template author is parsed into the same tree:
//!
//! ```text
//! expr       := and_expr ( OR and_expr )*
//! and_expr   := unary ( AND unary )*
//! unary      := NOT unary | '(' expr ')' | comparison
//! comparison := field ( '=' | '==' | '!=' | '<>' | '<' | '<=' | '>' | '>=' | CONTAINS ) value
//! value      := 'quoted' | "quoted" | number | true | false | null | bare-word
//! ```
//!
//! [`Filter`]'s `Display` renders a SQL-like clause for external stores.

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use crate::core::SyncError;
use crate::markdown::Fields;

/// Ordering comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// A predicate over store rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every row.
    All,
    /// Field equals value; an array-valued field matches if any element does.
    Eq(String, Value),
    /// Negation of [`Filter::Eq`].
    Ne(String, Value),
    /// Ordered comparison on numbers or strings.
    Cmp(String, CmpOp, Value),
    /// Array field contains value, or string field contains substring.
    Contains(String, Value),
    /// All children match.
    And(Vec<Filter>),
    /// Any child matches.
    Or(Vec<Filter>),
    /// Child does not match.
    Not(Box<Filter>),
}

impl Filter {
    /// `field = value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    /// `field CONTAINS value`.
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Contains(field.into(), value.into())
    }

    /// Conjunction, flattening nested `And`s and dropping `All`.
    pub fn and(self, other: Filter) -> Self {
        let mut parts = Vec::new();
        for f in [self, other] {
            match f {
                Self::All => {}
                Self::And(children) => parts.extend(children),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Self::All,
            1 => parts.remove(0),
            _ => Self::And(parts),
        }
    }

    /// Disjunction of `filters`; a single filter is returned unchanged.
    pub fn any(mut filters: Vec<Filter>) -> Self {
        match filters.len() {
            0 => Self::Not(Box::new(Self::All)),
            1 => filters.remove(0),
            _ => Self::Or(filters),
        }
    }

    /// Parse a where-expression.
    pub fn parse(expr: &str) -> Result<Self, SyncError> {
        let tokens = tokenize(expr)?;
        if tokens.is_empty() {
            return Ok(Self::All);
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
        };
        let filter = parser.parse_or()?;
        if parser.pos < parser.tokens.len() {
            return Err(SyncError::query(format!(
                "unexpected {} in where clause `{expr}`",
                parser.tokens[parser.pos]
            )));
        }
        Ok(filter)
    }

    /// Evaluate the filter against a row.
    pub fn matches(&self, row: &Fields) -> bool {
        match self {
            Self::All => true,
            Self::Eq(field, value) => row.get(field).is_some_and(|v| loose_eq_any(v, value)),
            Self::Ne(field, value) => !row.get(field).is_some_and(|v| loose_eq_any(v, value)),
            Self::Cmp(field, op, value) => row
                .get(field)
                .and_then(|v| compare_values(v, value))
                .is_some_and(|ordering| op.accepts(ordering)),
            Self::Contains(field, value) => match row.get(field) {
                Some(Value::Array(items)) => items.iter().any(|item| loose_eq(item, value)),
                Some(Value::String(s)) => value_text(value).is_some_and(|needle| s.contains(&needle)),
                _ => false,
            },
            Self::And(children) => children.iter().all(|c| c.matches(row)),
            Self::Or(children) => children.iter().any(|c| c.matches(row)),
            Self::Not(child) => !child.matches(row),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "TRUE"),
            Self::Eq(field, value) => write!(f, "{field} = {}", SqlValue(value)),
            Self::Ne(field, value) => write!(f, "{field} != {}", SqlValue(value)),
            Self::Cmp(field, op, value) => write!(f, "{field} {} {}", op.symbol(), SqlValue(value)),
            Self::Contains(field, value) => write!(f, "{field} CONTAINS {}", SqlValue(value)),
            Self::And(children) => write_joined(f, children, " AND ", |c| matches!(c, Self::Or(_))),
            Self::Or(children) => write_joined(f, children, " OR ", |c| matches!(c, Self::And(_))),
            Self::Not(child) => write!(f, "NOT ({child})"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    children: &[Filter],
    separator: &str,
    needs_parens: impl Fn(&Filter) -> bool,
) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        if needs_parens(child) {
            write!(f, "({child})")?;
        } else {
            write!(f, "{child}")?;
        }
    }
    Ok(())
}

struct SqlValue<'a>(&'a Value);

impl fmt::Display for SqlValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Null => write!(f, "NULL"),
            other => write!(f, "{other}"),
        }
    }
}

/// Text form used for loose comparisons between strings and scalars.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (value_text(a), value_text(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn loose_eq_any(field_value: &Value, expected: &Value) -> bool {
    match field_value {
        Value::Array(items) if !expected.is_array() => {
            items.iter().any(|item| loose_eq(item, expected))
        }
        other => loose_eq(other, expected),
    }
}

/// Compare two values: numerically when both are numbers, otherwise as text.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    match (value_text(a), value_text(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str(String),
    Op(&'static str),
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(w) => write!(f, "`{w}`"),
            Self::Str(s) => write!(f, "'{s}'"),
            Self::Op(op) => write!(f, "`{op}`"),
            Self::LParen => write!(f, "`(`"),
            Self::RParen => write!(f, "`)`"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, SyncError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            _ if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(SyncError::query(format!(
                                "unterminated string in where clause `{input}`"
                            )));
                        }
                        // SQL-style doubled quote
                        Some(&ch) if ch == quote && chars.get(i + 1) == Some(&quote) => {
                            value.push(quote);
                            i += 2;
                        }
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&'\\') if chars.get(i + 1).is_some() => {
                            value.push(chars[i + 1]);
                            i += 2;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(value));
            }
            '=' => {
                i += if chars.get(i + 1) == Some(&'=') { 2 } else { 1 };
                tokens.push(Token::Op("="));
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("!="));
                i += 2;
            }
            '<' => match chars.get(i + 1) {
                Some('=') => {
                    tokens.push(Token::Op("<="));
                    i += 2;
                }
                Some('>') => {
                    tokens.push(Token::Op("!="));
                    i += 2;
                }
                _ => {
                    tokens.push(Token::Op("<"));
                    i += 1;
                }
            },
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Op(">="));
                    i += 2;
                } else {
                    tokens.push(Token::Op(">"));
                    i += 1;
                }
            }
            _ if is_word_char(c) => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            other => {
                return Err(SyncError::query(format!(
                    "unexpected character `{other}` in where clause `{input}`"
                )));
            }
        }
    }

    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '$')
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
        self.pos += 1;
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn parse_or(&mut self) -> Result<Filter, SyncError> {
        let mut parts = vec![self.parse_and()?];
        while self.peek_keyword("or") {
            self.pos += 1;
            parts.push(self.parse_and()?);
        }
        Ok(if parts.len() == 1 { parts.remove(0) } else { Filter::Or(parts) })
    }

    fn parse_and(&mut self) -> Result<Filter, SyncError> {
        let mut parts = vec![self.parse_unary()?];
        while self.peek_keyword("and") {
            self.pos += 1;
            parts.push(self.parse_unary()?);
        }
        Ok(if parts.len() == 1 { parts.remove(0) } else { Filter::And(parts) })
    }

    fn parse_unary(&mut self) -> Result<Filter, SyncError> {
        if self.peek_keyword("not") {
            self.pos += 1;
            return Ok(Filter::Not(Box::new(self.parse_unary()?)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.parse_or()?;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                _ => Err(SyncError::query("missing `)` in where clause")),
            };
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Filter, SyncError> {
        let field = match self.next() {
            Some(Token::Word(w)) => w,
            Some(other) => return Err(SyncError::query(format!("expected field name, found {other}"))),
            None => return Err(SyncError::query("expected field name, found end of input")),
        };

        if self.peek_keyword("contains") {
            self.pos += 1;
            let value = self.parse_value()?;
            return Ok(Filter::Contains(field, value));
        }

        let op = match self.next() {
            Some(Token::Op(op)) => op,
            Some(other) => {
                return Err(SyncError::query(format!(
                    "expected operator after `{field}`, found {other}"
                )));
            }
            None => return Err(SyncError::query(format!("expected operator after `{field}`"))),
        };
        let value = self.parse_value()?;

        Ok(match op {
            "=" => Filter::Eq(field, value),
            "!=" => Filter::Ne(field, value),
            "<" => Filter::Cmp(field, CmpOp::Lt, value),
            "<=" => Filter::Cmp(field, CmpOp::Le, value),
            ">" => Filter::Cmp(field, CmpOp::Gt, value),
            _ => Filter::Cmp(field, CmpOp::Ge, value),
        })
    }

    fn parse_value(&mut self) -> Result<Value, SyncError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::Word(w)) => Ok(word_value(&w)),
            Some(other) => Err(SyncError::query(format!("expected value, found {other}"))),
            None => Err(SyncError::query("expected value, found end of input")),
        }
    }
}

fn word_value(word: &str) -> Value {
    match word.to_ascii_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = word.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = word.parse::<f64>()
        && let Some(n) = serde_json::Number::from_f64(f)
    {
        return Value::Number(n);
    }
    Value::String(word.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_simple_equality() {
        let f = Filter::parse("type = 'Post'").unwrap();
        assert_eq!(f, Filter::eq("type", "Post"));
        assert_eq!(Filter::parse("type == Post").unwrap(), Filter::eq("type", "Post"));
    }

    #[test]
    fn test_parse_precedence() {
        let f = Filter::parse("a = 1 OR b = 2 AND c = 3").unwrap();
        assert_eq!(
            f,
            Filter::Or(vec![
                Filter::eq("a", 1),
                Filter::And(vec![Filter::eq("b", 2), Filter::eq("c", 3)]),
            ])
        );
    }

    #[test]
    fn test_parse_parens_and_not() {
        let f = Filter::parse("NOT (a = 1 or a = 2) and draft != true").unwrap();
        assert!(f.matches(&row(json!({"a": 3, "draft": false}))));
        assert!(!f.matches(&row(json!({"a": 2, "draft": false}))));
        assert!(!f.matches(&row(json!({"a": 3, "draft": true}))));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Filter::parse("type = ").is_err());
        assert!(Filter::parse("type 'Post'").is_err());
        assert!(Filter::parse("(a = 1").is_err());
        assert!(Filter::parse("a = 'open").is_err());
        assert!(Filter::parse("a = 1 b").is_err());
        assert!(Filter::parse("a ~ 1").is_err());
    }

    #[test]
    fn test_empty_where_matches_all() {
        assert_eq!(Filter::parse("   ").unwrap(), Filter::All);
    }

    #[test]
    fn test_eq_matches_array_elements() {
        let f = Filter::eq("tags", "rust");
        assert!(f.matches(&row(json!({"tags": ["go", "rust"]}))));
        assert!(!f.matches(&row(json!({"tags": ["go"]}))));
        assert!(!f.matches(&row(json!({}))));
    }

    #[test]
    fn test_loose_equality_between_numbers_and_strings() {
        assert!(Filter::eq("n", "5").matches(&row(json!({"n": 5}))));
        assert!(Filter::eq("n", 5).matches(&row(json!({"n": "5"}))));
    }

    #[test]
    fn test_comparisons() {
        let f = Filter::parse("year >= 2020 and year < 2024").unwrap();
        assert!(f.matches(&row(json!({"year": 2021}))));
        assert!(!f.matches(&row(json!({"year": 2024}))));
        let f = Filter::parse("date > '2024-01-01'").unwrap();
        assert!(f.matches(&row(json!({"date": "2024-02-01"}))));
    }

    #[test]
    fn test_contains() {
        let f = Filter::parse("tags CONTAINS rust").unwrap();
        assert!(f.matches(&row(json!({"tags": ["rust"]}))));
        let f = Filter::parse("title contains 'ell'").unwrap();
        assert!(f.matches(&row(json!({"title": "Hello"}))));
    }

    #[test]
    fn test_display_renders_sql_like_clause() {
        let f = Filter::eq("type", "Post")
            .and(Filter::Or(vec![Filter::eq("topic", "it's"), Filter::contains("topics", "x")]));
        assert_eq!(f.to_string(), "type = 'Post' AND (topic = 'it''s' OR topics CONTAINS 'x')");
    }

    #[test]
    fn test_and_flattens() {
        let f = Filter::All.and(Filter::eq("a", 1)).and(Filter::eq("b", 2));
        assert_eq!(f, Filter::And(vec![Filter::eq("a", 1), Filter::eq("b", 2)]));
    }
}
