//! Program parsing seam
//!
//! Turning source text into an interpreter payload is delegated to a
//! [`ProgramParser`]. The grammar itself belongs to the interpreter, so the
//! bundled [`SourceParser`] only performs the lexical checks that can be done
//! client-side (balanced delimiters, terminated string literals) and ships the
//! source to the server.

use serde::Serialize;
use thiserror::Error;

/// Structured program ready to be posted to the interpreter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Program(serde_json::Value);

#[cfg(test)]
impl Program {
    pub fn payload(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Malformed program, reported before anything is sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Syntax error (line {line}, column {column}): {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    fn at(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Pure function from source text to a program payload.
pub trait ProgramParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<Program, ParseError>;
}

/// Lexical pre-check; the interpreter parses the source itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceParser;

impl ProgramParser for SourceParser {
    fn parse(&self, source: &str) -> Result<Program, ParseError> {
        check_delimiters(source)?;
        Ok(Program(serde_json::json!({ "source": source })))
    }
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn check_delimiters(source: &str) -> Result<(), ParseError> {
    // (delimiter, line, column) of every unclosed opener
    let mut stack: Vec<(char, usize, usize)> = Vec::new();
    let mut string: Option<(char, usize, usize)> = None;
    let mut escaped = false;

    for (line_idx, line) in source.lines().enumerate() {
        let line_no = line_idx + 1;
        for (col_idx, ch) in line.chars().enumerate() {
            let col = col_idx + 1;

            if let Some((quote, _, _)) = string {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == quote {
                    string = None;
                }
                continue;
            }

            match ch {
                '"' | '\'' => string = Some((ch, line_no, col)),
                '(' | '[' | '{' => stack.push((ch, line_no, col)),
                ')' | ']' | '}' => match stack.pop() {
                    Some((open, _, _)) if closing_for(open) == ch => {}
                    Some((open, open_line, open_col)) => {
                        return Err(ParseError::at(
                            line_no,
                            col,
                            format!(
                                "'{}' does not close '{}' opened at line {}, column {}",
                                ch, open, open_line, open_col
                            ),
                        ));
                    }
                    None => {
                        return Err(ParseError::at(line_no, col, format!("unexpected '{}'", ch)));
                    }
                },
                _ => {}
            }
        }

        // String literals do not span lines
        if let Some((quote, start_line, start_col)) = string {
            return Err(ParseError::at(
                start_line,
                start_col,
                format!("unterminated string literal (missing {})", quote),
            ));
        }
        escaped = false;
    }

    if let Some((open, line, col)) = stack.pop() {
        return Err(ParseError::at(line, col, format!("unclosed '{}'", open)));
    }
    Ok(())
}
