//! Parser for component constructor strings such as `Disease('CHD')`.
//!
//! Grammar: an identifier, optionally followed by a parenthesised,
//! comma-separated list of arguments. Arguments are single- or double-quoted
//! strings (with `\` escapes) or bare tokens of letters, digits, `_`, `.`
//! and `-`. Arguments are kept verbatim; coercion is left to factories.

use smallvec::SmallVec;

use crate::error::{Result, SimulationError};

/// Constructor arguments; almost every component takes zero to two
pub type ConstructorArgs = SmallVec<[String; 2]>;

/// Parse a constructor string into its name and arguments
///
/// # Errors
/// Returns `Specification` describing the first offending character
pub fn parse_constructor(text: &str) -> Result<(String, ConstructorArgs)> {
    let mut parser = Parser {
        text,
        chars: text.char_indices().peekable(),
    };
    parser.skip_whitespace();
    let name = parser.identifier()?;
    parser.skip_whitespace();

    let args = match parser.chars.peek() {
        None => ConstructorArgs::new(),
        Some(&(_, '(')) => {
            parser.chars.next();
            let args = parser.arguments()?;
            parser.skip_whitespace();
            if let Some(&(pos, c)) = parser.chars.peek() {
                return Err(parser.error(pos, &format!("unexpected '{c}' after ')'")));
            }
            args
        }
        Some(&(pos, c)) => return Err(parser.error(pos, &format!("expected '(' but found '{c}'"))),
    };

    Ok((name, args))
}

struct Parser<'a> {
    text: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl Parser<'_> {
    fn error(&self, pos: usize, message: &str) -> SimulationError {
        SimulationError::Specification(format!(
            "invalid component constructor '{}' at column {}: {message}",
            self.text,
            pos + 1
        ))
    }

    fn end_error(&self, message: &str) -> SimulationError {
        self.error(self.text.len(), message)
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|&(_, c)| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn identifier(&mut self) -> Result<String> {
        let mut name = String::new();
        match self.chars.peek() {
            Some(&(_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
            Some(&(pos, c)) => {
                return Err(self.error(pos, &format!("component names must start with a letter, found '{c}'")));
            }
            None => return Err(self.end_error("empty component constructor")),
        }
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        Ok(name)
    }

    fn arguments(&mut self) -> Result<ConstructorArgs> {
        let mut args = ConstructorArgs::new();
        loop {
            self.skip_whitespace();
            match self.chars.peek() {
                Some(&(_, ')')) => {
                    self.chars.next();
                    return Ok(args);
                }
                Some(_) => args.push(self.argument()?),
                None => return Err(self.end_error("missing ')'")),
            }

            self.skip_whitespace();
            match self.chars.next() {
                Some((_, ',')) => {}
                Some((_, ')')) => return Ok(args),
                Some((pos, c)) => {
                    return Err(self.error(pos, &format!("expected ',' or ')' but found '{c}'")));
                }
                None => return Err(self.end_error("missing ')'")),
            }
        }
    }

    fn argument(&mut self) -> Result<String> {
        match self.chars.peek() {
            Some(&(_, quote @ ('\'' | '"'))) => {
                self.chars.next();
                self.quoted(quote)
            }
            _ => self.bare(),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String> {
        let mut value = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => match self.chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => return Err(self.end_error("dangling escape")),
                },
                c if c == quote => return Ok(value),
                c => value.push(c),
            }
        }
        Err(self.end_error("unterminated string argument"))
    }

    fn bare(&mut self) -> Result<String> {
        let mut value = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                value.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if value.is_empty() {
            return match self.chars.peek() {
                Some(&(pos, c)) => Err(self.error(pos, &format!("unexpected '{c}' in argument list"))),
                None => Err(self.end_error("missing ')'")),
            };
        }
        Ok(value)
    }
}

/// Render a name and arguments back into constructor syntax
#[must_use]
pub fn format_constructor(name: &str, args: &[String]) -> String {
    let rendered: Vec<String> = args
        .iter()
        .map(|arg| format!("'{}'", arg.replace('\\', "\\\\").replace('\'', "\\'")))
        .collect();
    format!("{name}({})", rendered.join(", "))
}
