//! Dice formula parser
//!
//! Grammar:
//! ```text
//! expression := [sign] term (sign term)* qualifier*
//! term       := atom | "(" atom ")"
//! atom       := NUMBER | NUMBER "d" NUMBER | "d" NUMBER | IDENT
//! qualifier  := ("advantage" | "adv") [NUMBER]
//!             | ("disadvantage" | "dis") [NUMBER]
//!             | "multihit" NUMBER
//! ```
//! Identifiers in term position name stats; unknown names are kept as
//! zero-valued terms. Words after the last term must be qualifiers.

use super::expression::{DiceExpression, SignedTerm, Term};
use crate::config::DiceConstants;
use crate::types::StatTag;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What went wrong while parsing
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("malformed dice notation")]
    MalformedDice,
    #[error("{0}")]
    DiceLimit(String),
    #[error("unbalanced parentheses")]
    UnbalancedParentheses,
    #[error("operator is not followed by a term")]
    DanglingOperator,
    #[error("unknown qualifier '{0}'")]
    UnknownQualifier(String),
    #[error("qualifier '{0}' requires a number")]
    MissingQualifierArgument(String),
    #[error("qualifier '{0}' given more than once")]
    ConflictingQualifier(String),
}

/// Malformed dice formula
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("invalid dice expression '{expression}' at position {position}: {kind}")]
pub struct ParseError {
    pub expression: String,
    /// Character offset where the problem was detected
    pub position: usize,
    pub kind: ParseErrorKind,
}

/// Parse a formula using the default limits
pub fn parse(text: &str) -> Result<DiceExpression, ParseError> {
    parse_with_limits(text, &DiceConstants::default())
}

/// Parse a formula, enforcing the given dice limits
pub fn parse_with_limits(text: &str, limits: &DiceConstants) -> Result<DiceExpression, ParseError> {
    Parser::new(text, limits).expression()
}

const QUALIFIER_WORDS: [&str; 5] = ["advantage", "adv", "disadvantage", "dis", "multihit"];

struct Parser<'a> {
    text: &'a str,
    chars: Vec<char>,
    pos: usize,
    limits: &'a DiceConstants,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, limits: &'a DiceConstants) -> Self {
        Parser {
            text,
            chars: text.chars().collect(),
            pos: 0,
            limits,
        }
    }

    fn expression(&mut self) -> Result<DiceExpression, ParseError> {
        self.skip_ws();
        if self.at_end() {
            return Err(self.error(ParseErrorKind::Empty));
        }

        let mut negative = false;
        if let Some(c @ ('+' | '-')) = self.peek() {
            negative = c == '-';
            self.bump();
        }

        let mut terms = Vec::new();
        loop {
            let term = self.term()?;
            terms.push(SignedTerm { negative, term });

            self.skip_ws();
            match self.peek() {
                None => break,
                Some('+') => negative = false,
                Some('-') => negative = true,
                Some(c) if c.is_ascii_alphabetic() => break,
                Some(')') => return Err(self.error(ParseErrorKind::UnbalancedParentheses)),
                Some(c) => return Err(self.error(ParseErrorKind::UnexpectedCharacter(c))),
            }
            self.bump();
        }

        let mut expr = DiceExpression::from_terms(terms);
        self.qualifiers(&mut expr)?;
        Ok(expr)
    }

    fn term(&mut self) -> Result<Term, ParseError> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            None | Some('+') | Some('-') => Err(self.error(ParseErrorKind::DanglingOperator)),
            Some(')') => Err(self.error(ParseErrorKind::UnbalancedParentheses)),
            Some('(') => {
                self.bump();
                let inner = self.atom()?;
                self.skip_ws();
                if self.peek() == Some(')') {
                    self.bump();
                    Ok(inner)
                } else {
                    Err(self.error_at(start, ParseErrorKind::UnbalancedParentheses))
                }
            }
            Some(_) => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<Term, ParseError> {
        self.skip_ws();
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let count = self.number()?;
                if matches!(self.peek(), Some('d' | 'D')) {
                    self.bump();
                    let sides = self.dice_sides(start)?;
                    self.dice(start, count, sides)
                } else if self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
                    Err(self.error(ParseErrorKind::MalformedDice))
                } else {
                    self.flat(start, count)
                }
            }
            Some(c) if c.is_ascii_alphabetic() => {
                let word = self.word();
                let lower = word.to_lowercase();

                if let Some(rest) = lower.strip_prefix('d') {
                    if rest.is_empty() {
                        return Err(self.error_at(start, ParseErrorKind::MalformedDice));
                    }
                    if rest.starts_with(|c: char| c.is_ascii_digit()) {
                        let sides: u32 = rest
                            .parse()
                            .map_err(|_| self.error_at(start, ParseErrorKind::MalformedDice))?;
                        return self.dice(start, 1, sides);
                    }
                }

                if let Ok(stat) = lower.parse::<StatTag>() {
                    return Ok(Term::Stat { stat });
                }

                if QUALIFIER_WORDS.contains(&lower.as_str()) {
                    return Err(self.error_at(start, ParseErrorKind::DanglingOperator));
                }

                Ok(Term::UnknownStat { name: lower })
            }
            Some('(') | Some(')') => Err(self.error(ParseErrorKind::UnbalancedParentheses)),
            Some(c) => Err(self.error(ParseErrorKind::UnexpectedCharacter(c))),
            None => Err(self.error(ParseErrorKind::DanglingOperator)),
        }
    }

    fn flat(&self, start: usize, value: u32) -> Result<Term, ParseError> {
        if value > self.limits.max_flat {
            return Err(self.error_at(
                start,
                ParseErrorKind::DiceLimit(format!(
                    "{} exceeds the flat value limit of {}",
                    value, self.limits.max_flat
                )),
            ));
        }
        let value = i32::try_from(value).map_err(|_| {
            self.error_at(start, ParseErrorKind::DiceLimit("number too large".to_string()))
        })?;
        Ok(Term::Flat { value })
    }

    fn dice_sides(&mut self, start: usize) -> Result<u32, ParseError> {
        if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
            return Err(self.error_at(start, ParseErrorKind::MalformedDice));
        }
        let sides = self.number()?;
        if self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return Err(self.error_at(start, ParseErrorKind::MalformedDice));
        }
        Ok(sides)
    }

    fn dice(&self, start: usize, count: u32, sides: u32) -> Result<Term, ParseError> {
        let limit = |msg: String| self.error_at(start, ParseErrorKind::DiceLimit(msg));

        if count == 0 {
            return Err(limit("dice count must be at least 1".to_string()));
        }
        if sides == 0 {
            return Err(limit("die sides must be at least 1".to_string()));
        }
        if count > self.limits.max_dice_count {
            return Err(limit(format!(
                "{} dice exceeds the limit of {}",
                count, self.limits.max_dice_count
            )));
        }
        if sides > self.limits.max_sides {
            return Err(limit(format!(
                "d{} exceeds the limit of {} sides",
                sides, self.limits.max_sides
            )));
        }

        Ok(Term::Dice { count, sides })
    }

    fn qualifiers(&mut self, expr: &mut DiceExpression) -> Result<(), ParseError> {
        loop {
            self.skip_ws();
            let start = self.pos;
            match self.peek() {
                None => return Ok(()),
                Some(c) if c.is_ascii_alphabetic() => {}
                Some(c) => return Err(self.error(ParseErrorKind::UnexpectedCharacter(c))),
            }

            let word = self.word().to_lowercase();
            match word.as_str() {
                "advantage" | "adv" => {
                    let level = self.qualifier_level(start)?;
                    expr.advantage = expr.advantage.saturating_add(level);
                }
                "disadvantage" | "dis" => {
                    let level = self.qualifier_level(start)?;
                    expr.advantage = expr.advantage.saturating_sub(level);
                }
                "multihit" => {
                    let hits = self.optional_number()?.ok_or_else(|| {
                        self.error_at(start, ParseErrorKind::MissingQualifierArgument(word.clone()))
                    })?;
                    if expr.multihit.is_some() {
                        return Err(self.error_at(start, ParseErrorKind::ConflictingQualifier(word)));
                    }
                    if hits == 0 || hits > self.limits.max_multihit {
                        return Err(self.error_at(
                            start,
                            ParseErrorKind::DiceLimit(format!(
                                "multihit must be between 1 and {}",
                                self.limits.max_multihit
                            )),
                        ));
                    }
                    expr.multihit = Some(hits);
                }
                _ => return Err(self.error_at(start, ParseErrorKind::UnknownQualifier(word))),
            }
        }
    }

    fn qualifier_level(&mut self, start: usize) -> Result<i32, ParseError> {
        let level = self.optional_number()?.unwrap_or(1);
        if level == 0 || level > self.limits.max_advantage_level {
            return Err(self.error_at(
                start,
                ParseErrorKind::DiceLimit(format!(
                    "advantage level must be between 1 and {}",
                    self.limits.max_advantage_level
                )),
            ));
        }
        // bounded by max_advantage_level above
        Ok(level as i32)
    }

    fn optional_number(&mut self) -> Result<Option<u32>, ParseError> {
        self.skip_ws();
        if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.number().map(Some)
        } else {
            Ok(None)
        }
    }

    fn number(&mut self) -> Result<u32, ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse()
            .map_err(|_| self.error_at(start, ParseErrorKind::DiceLimit("number too large".to_string())))
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        self.error_at(self.pos, kind)
    }

    fn error_at(&self, position: usize, kind: ParseErrorKind) -> ParseError {
        ParseError {
            expression: self.text.to_string(),
            position,
            kind,
        }
    }
}
