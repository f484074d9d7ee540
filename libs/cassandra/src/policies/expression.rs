//! Policy expression syntax.
//!
//! ```text
//! expression := identifier "(" [ argument { "," argument } ] ")"
//! argument   := expression
//!             | "'" text "'" | "\"" text "\""
//!             | [ "(int)" | "(long)" ] integer
//!             | ( "(double)" | "(float)" ) number
//! ```
//!
//! Type markers are case-insensitive. A decimal literal must carry an explicit
//! `(double)` or `(float)` marker.

use std::fmt;

use super::PolicyError;

/// One parsed `Name(args...)` node.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyExpression {
    pub name: String,
    pub arguments: Vec<Argument>,
}

/// A positional argument; the variant is fixed at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Str(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Policy(PolicyExpression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentKind {
    String,
    Int,
    Long,
    Float,
    Double,
    Policy,
}

impl fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "String",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Policy => "policy",
        };
        f.write_str(name)
    }
}

impl Argument {
    pub fn kind(&self) -> ArgumentKind {
        match self {
            Self::Str(_) => ArgumentKind::String,
            Self::Int(_) => ArgumentKind::Int,
            Self::Long(_) => ArgumentKind::Long,
            Self::Float(_) => ArgumentKind::Float,
            Self::Double(_) => ArgumentKind::Double,
            Self::Policy(_) => ArgumentKind::Policy,
        }
    }
}

impl PolicyExpression {
    /// Parse `input` into an expression tree.
    ///
    /// Returns `Ok(None)` when the input is not shaped like a call at all (no
    /// parenthesis, or nothing identifier-like before it). Anything that starts
    /// as a call but is broken inside is an error.
    pub fn parse(input: &str) -> Result<Option<Self>, PolicyError> {
        let input = input.trim();
        let Some(open) = input.find('(') else {
            return Ok(None);
        };

        let name = input[..open].trim();
        if !is_identifier(name) {
            return Ok(None);
        }

        let close = matching_paren(input, open)?;
        if close != input.len() - 1 {
            return Err(PolicyError::malformed(
                input,
                "unexpected text after the closing parenthesis",
            ));
        }

        let arguments = split_arguments(input, &input[open + 1..close])?
            .into_iter()
            .map(classify)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Self {
            name: name.to_string(),
            arguments,
        }))
    }

    /// Names of the argument kinds, in order.
    pub fn signature(&self) -> Vec<ArgumentKind> {
        self.arguments.iter().map(Argument::kind).collect()
    }

    /// Depth of the deepest nested policy; a call without policy arguments is 1.
    pub fn depth(&self) -> usize {
        1 + self
            .arguments
            .iter()
            .filter_map(|arg| match arg {
                Argument::Policy(child) => Some(child.depth()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }
}

impl fmt::Display for PolicyExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match arg {
                Argument::Str(s) => write!(f, "\"{s}\"")?,
                Argument::Int(v) => write!(f, "{v}")?,
                Argument::Long(v) => write!(f, "(long) {v}")?,
                Argument::Float(v) => write!(f, "(float) {v:?}")?,
                Argument::Double(v) => write!(f, "(double) {v:?}")?,
                Argument::Policy(child) => write!(f, "{child}")?,
            }
        }
        f.write_str(")")
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Byte index of the parenthesis closing the one at `open`.
fn matching_paren(input: &str, open: usize) -> Result<usize, PolicyError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in input[open..].char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + i);
                }
            }
            _ => {}
        }
    }

    if quote.is_some() {
        Err(PolicyError::malformed(input, "unterminated quote"))
    } else {
        Err(PolicyError::malformed(input, "unbalanced parentheses"))
    }
}

/// Split an argument list on commas at nesting depth 0 outside quotes.
fn split_arguments<'a>(expression: &str, body: &'a str) -> Result<Vec<&'a str>, PolicyError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut arguments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| PolicyError::malformed(expression, "unbalanced parentheses"))?;
            }
            ',' if depth == 0 => {
                arguments.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(PolicyError::malformed(expression, "unterminated quote"));
    }
    if depth != 0 {
        return Err(PolicyError::malformed(expression, "unbalanced parentheses"));
    }

    arguments.push(body[start..].trim());
    if arguments.iter().any(|arg| arg.is_empty()) {
        return Err(PolicyError::malformed(expression, "empty argument"));
    }

    Ok(arguments)
}

fn classify(argument: &str) -> Result<Argument, PolicyError> {
    let starts_like_name = argument
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    if starts_like_name && argument.contains('(') {
        return match PolicyExpression::parse(argument)? {
            Some(child) => Ok(Argument::Policy(child)),
            None => Err(PolicyError::malformed(argument, "not a policy call")),
        };
    }

    if argument.contains(['\'', '"']) {
        return unquote(argument).map(|s| Argument::Str(s.to_string()));
    }

    classify_number(argument)
}

fn unquote(argument: &str) -> Result<&str, PolicyError> {
    let mut chars = argument.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if first == last && (first == '\'' || first == '"') => {
            Ok(&argument[1..argument.len() - 1])
        }
        _ => Err(PolicyError::malformed(argument, "mismatched quotes")),
    }
}

/// Split a leading `(marker)` from the literal that follows it.
fn type_marker(argument: &str) -> Result<(Option<String>, &str), PolicyError> {
    let Some(rest) = argument.strip_prefix('(') else {
        return Ok((None, argument));
    };
    let close = rest
        .find(')')
        .ok_or_else(|| PolicyError::malformed(argument, "unterminated type marker"))?;

    Ok((
        Some(rest[..close].trim().to_ascii_lowercase()),
        rest[close + 1..].trim(),
    ))
}

fn classify_number(argument: &str) -> Result<Argument, PolicyError> {
    let (marker, literal) = type_marker(argument)?;
    let bad = |e: &dyn fmt::Display| PolicyError::invalid(argument, e.to_string());

    match marker.as_deref() {
        Some("double") => literal.parse().map(Argument::Double).map_err(|e| bad(&e)),
        Some("float") => literal.parse().map(Argument::Float).map_err(|e| bad(&e)),
        Some("long") => literal.parse().map(Argument::Long).map_err(|e| bad(&e)),
        Some("int") => literal.parse().map(Argument::Int).map_err(|e| bad(&e)),
        Some(other) => Err(PolicyError::invalid(
            argument,
            format!("unknown type marker `({other})`"),
        )),
        None if literal.contains('.') => Err(PolicyError::invalid(
            argument,
            "decimal literals need an explicit (double) or (float) marker",
        )),
        None => literal.parse().map(Argument::Int).map_err(|e| bad(&e)),
    }
}
