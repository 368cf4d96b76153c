//! Error types for template parsing

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::parser::lexer::Token;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },
}

impl ParseError {
    pub fn span(&self) -> &Span {
        match self {
            ParseError::Syntax { span, .. } => span,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        match self {
            ParseError::Syntax {
                span,
                message,
                expected,
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };

                let written = Report::build(ReportKind::Error, filename, span.start)
                    .with_message(message)
                    .with_label(
                        Label::new((filename, span.clone()))
                            .with_message(format!("{}{}", message, expected_str))
                            .with_color(Color::Red),
                    )
                    .finish()
                    .write((filename, Source::from(source)), &mut buf);
                if written.is_err() {
                    return self.to_string();
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl<'a> From<chumsky::error::Rich<'a, Token>> for ParseError {
    fn from(err: chumsky::error::Rich<'a, Token>) -> Self {
        use chumsky::error::RichReason;

        let message = match err.reason() {
            RichReason::ExpectedFound { found, .. } => {
                let found_str = match found {
                    Some(tok) => format_token(tok),
                    None => "end of input".to_string(),
                };
                format!("Unexpected {}", found_str)
            }
            RichReason::Custom(msg) => msg.to_string(),
        };

        let expected: Vec<String> = err
            .expected()
            .filter_map(|e| match e {
                chumsky::error::RichPattern::Token(tok) => Some(format_token(tok)),
                chumsky::error::RichPattern::Label(label) => Some(label.to_string()),
                chumsky::error::RichPattern::EndOfInput => Some("end of input".to_string()),
                chumsky::error::RichPattern::Identifier(s) => Some(format!("identifier '{}'", s)),
                chumsky::error::RichPattern::Any => Some("any token".to_string()),
                chumsky::error::RichPattern::SomethingElse => None,
            })
            .collect();

        ParseError::Syntax {
            span: err.span().into_range(),
            message,
            expected,
        }
    }
}

/// Format a token for human-readable error messages
fn format_token(tok: &Token) -> String {
    match tok {
        Token::Text(_) => "text".to_string(),
        Token::BlockOpen => "'{%'".to_string(),
        Token::BlockClose => "'%}'".to_string(),
        Token::VarOpen => "'{{'".to_string(),
        Token::VarClose => "'}}'".to_string(),
        Token::Ident(s) => format!("identifier '{}'", s),
        Token::Str(s) => format!("string \"{}\"", s),
        Token::Number(n) => format!("number {}", n),
        Token::Slash => "'/'".to_string(),
        Token::Equals => "'='".to_string(),
        Token::Dot => "'.'".to_string(),
        Token::Component => "keyword 'component'".to_string(),
        Token::EndComponent => "keyword 'endcomponent'".to_string(),
        Token::Fill => "keyword 'fill'".to_string(),
        Token::EndFill => "keyword 'endfill'".to_string(),
        Token::Slot => "keyword 'slot'".to_string(),
        Token::EndSlot => "keyword 'endslot'".to_string(),
        Token::Provide => "keyword 'provide'".to_string(),
        Token::EndProvide => "keyword 'endprovide'".to_string(),
        Token::If => "keyword 'if'".to_string(),
        Token::Else => "keyword 'else'".to_string(),
        Token::EndIf => "keyword 'endif'".to_string(),
        Token::For => "keyword 'for'".to_string(),
        Token::EndFor => "keyword 'endfor'".to_string(),
        _ => format!("{:?}", tok),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_includes_filename_and_message() {
        let src = "{% if x %}never closed";
        let errs = crate::parser::parse(src).unwrap_err();
        let report = errs[0].format(src, "page.html");
        assert!(report.contains("page.html"));
        assert!(report.contains("Unexpected"));
    }

    #[test]
    fn test_lex_error_span() {
        let src = "{{ a ! b }}";
        let errs = crate::parser::parse(src).unwrap_err();
        assert_eq!(&src[errs[0].span().clone()], "!");
    }
}
