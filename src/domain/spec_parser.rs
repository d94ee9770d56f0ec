//! Parser for indicator specs and signal conditions.
//!
//! Grammar:
//! ```text
//! spec      := NAME [ '(' number { ',' number } ')' ] [ '.' IDENT ]
//! condition := IDENT [ '.' IDENT ] TRIGGER number
//! conditions:= condition { ',' condition }
//! TRIGGER   := above | below | crosses_above | crosses_below
//! ```
//!
//! Errors carry the byte offset of the offending token.

use crate::domain::error::ParseError;
use crate::domain::graph::{IndicatorSpec, NamedKey};
use crate::domain::signal::TriggerKind;

/// A condition as written, before its series is bound to a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCondition {
    pub series: NamedKey,
    pub trigger: TriggerKind,
    pub threshold: f64,
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            message,
            position: self.pos,
        }
    }

    fn found(&self) -> String {
        self.peek()
            .map(|c| format!("'{}'", c))
            .unwrap_or_else(|| "end of input".to_string())
    }

    fn consume_char(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        if self.consume_char(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}', found {}", expected, self.found())))
        }
    }

    fn parse_ident(&mut self) -> Result<&'a str, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                self.advance();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.error(format!("expected identifier, found {}", self.found())));
        }
        Ok(&self.input[start..self.pos])
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_output(&mut self) -> Result<Option<&'a str>, ParseError> {
        if self.consume_char('.') {
            Ok(Some(self.parse_ident()?))
        } else {
            Ok(None)
        }
    }

    fn parse_spec(&mut self) -> Result<IndicatorSpec, ParseError> {
        let name = self.parse_ident()?;
        let mut params = Vec::new();
        if self.consume_char('(') {
            if !self.consume_char(')') {
                loop {
                    params.push(self.parse_number()?);
                    if self.consume_char(')') {
                        break;
                    }
                    self.expect_char(',')?;
                }
            }
        }
        let spec = IndicatorSpec::new(name, params);
        Ok(match self.parse_output()? {
            Some(output) => spec.with_output(output),
            None => spec,
        })
    }

    fn parse_trigger(&mut self) -> Result<TriggerKind, ParseError> {
        let start = self.pos;
        let word = self.parse_ident().map_err(|_| {
            self.error(format!(
                "expected trigger (above, below, crosses_above, crosses_below), found {}",
                self.found()
            ))
        })?;
        TriggerKind::parse(word).ok_or_else(|| ParseError {
            message: format!(
                "expected trigger (above, below, crosses_above, crosses_below), found '{}'",
                word
            ),
            position: start,
        })
    }

    fn parse_condition(&mut self) -> Result<ParsedCondition, ParseError> {
        let name = self.parse_ident()?;
        let series = match self.parse_output()? {
            Some(output) => NamedKey::with_output(name, output),
            None => NamedKey::new(name),
        };
        self.skip_whitespace();
        let trigger = self.parse_trigger()?;
        let threshold = self.parse_number()?;
        Ok(ParsedCondition {
            series,
            trigger,
            threshold,
        })
    }

    fn expect_end(&mut self, what: &str) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after {}: '{}'",
                what,
                self.remaining()
            )));
        }
        Ok(())
    }
}

/// Parses `SMA(20)`, `BOLLINGER(20,2).upper`, `MACD`.
pub fn parse_indicator_spec(input: &str) -> Result<IndicatorSpec, ParseError> {
    let mut parser = Parser::new(input);
    let spec = parser.parse_spec()?;
    parser.expect_end("indicator")?;
    Ok(spec)
}

/// Parses `fast crosses_above 70`.
pub fn parse_condition(input: &str) -> Result<ParsedCondition, ParseError> {
    let mut parser = Parser::new(input);
    let condition = parser.parse_condition()?;
    parser.expect_end("condition")?;
    Ok(condition)
}

/// Parses a `,`-separated list of conditions. Empty entries are skipped.
pub fn parse_conditions(input: &str) -> Result<Vec<ParsedCondition>, ParseError> {
    let mut parser = Parser::new(input);
    let mut out = Vec::new();
    loop {
        parser.skip_whitespace();
        if parser.pos >= parser.input.len() {
            break;
        }
        if parser.consume_char(',') {
            continue;
        }
        out.push(parser.parse_condition()?);
        parser.skip_whitespace();
        if parser.pos < parser.input.len() {
            parser.expect_char(',')?;
        }
    }
    if out.is_empty() {
        return Err(ParseError {
            message: "expected at least one condition".to_string(),
            position: 0,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_spec() {
        let spec = parse_indicator_spec("SMA(20)").unwrap();
        assert_eq!(spec.name, "SMA");
        assert_eq!(spec.params, vec![20.0]);
        assert_eq!(spec.output, None);
    }

    #[test]
    fn parse_spec_with_output_and_spaces() {
        let spec = parse_indicator_spec(" bollinger( 20 , 2.5 ).upper ").unwrap();
        assert_eq!(spec.name, "BOLLINGER");
        assert_eq!(spec.params, vec![20.0, 2.5]);
        assert_eq!(spec.output.as_deref(), Some("upper"));
    }

    #[test]
    fn parse_spec_without_params() {
        assert!(parse_indicator_spec("MACD").unwrap().params.is_empty());
        assert!(parse_indicator_spec("MACD()").unwrap().params.is_empty());
        let signal = parse_indicator_spec("MACD.signal").unwrap();
        assert_eq!(signal.output.as_deref(), Some("signal"));
    }

    #[test]
    fn spec_errors_report_position() {
        let err = parse_indicator_spec("SMA(20").unwrap_err();
        assert_eq!(err.position, 6);
        assert!(err.message.contains("end of input"));

        let err = parse_indicator_spec("SMA(x)").unwrap_err();
        assert_eq!(err.position, 4);
        assert_eq!(err.message, "expected number");

        let err = parse_indicator_spec("SMA(2) extra").unwrap_err();
        assert!(err.message.contains("unexpected input"));
    }

    #[test]
    fn parse_condition_forms() {
        let c = parse_condition("fast crosses_above 70").unwrap();
        assert_eq!(c.series, NamedKey::new("fast"));
        assert_eq!(c.trigger, TriggerKind::CrossesAbove);
        assert_eq!(c.threshold, 70.0);

        let c = parse_condition("bb.lower below -1.5").unwrap();
        assert_eq!(c.series, NamedKey::with_output("bb", "lower"));
        assert_eq!(c.trigger, TriggerKind::Below);
        assert_eq!(c.threshold, -1.5);
    }

    #[test]
    fn unknown_trigger_is_rejected() {
        let err = parse_condition("fast sideways 70").unwrap_err();
        assert_eq!(err.position, 5);
        assert!(err.message.contains("sideways"));
    }

    #[test]
    fn parse_condition_list() {
        let list = parse_conditions("fast above 70, slow above 60,").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].series, NamedKey::new("slow"));
        assert_eq!(list[1].threshold, 60.0);
    }

    #[test]
    fn empty_condition_list_is_rejected() {
        assert!(parse_conditions("  ").is_err());
        assert!(parse_conditions("fast above 70 slow above 60").is_err());
    }

    #[test]
    fn error_context_points_at_offset() {
        let input = "fast above";
        let err = parse_condition(input).unwrap_err();
        let rendered = err.display_with_context(input);
        assert!(rendered.starts_with("fast above\n          ^"));
    }
}
