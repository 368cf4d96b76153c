//! Lexer for the template language using logos
//!
//! Templates are mostly raw text. [`lex`] first splits the source into text runs
//! and `{{ }}` / `{% %}` / `{# #}` regions, then runs logos over the inside of each
//! tag. Text runs and delimiters come out as synthetic tokens so the grammar sees a
//! single stream.

use logos::Logos;

use crate::error::ParseError;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\r]+")]
pub enum Token {
    // Produced by the segmenter, never by logos
    Text(String),
    BlockOpen,
    BlockClose,
    VarOpen,
    VarClose,

    // Tag keywords
    #[token("component")]
    Component,
    #[token("endcomponent")]
    EndComponent,
    #[token("fill")]
    Fill,
    #[token("endfill")]
    EndFill,
    #[token("slot")]
    Slot,
    #[token("endslot")]
    EndSlot,
    #[token("provide")]
    Provide,
    #[token("endprovide")]
    EndProvide,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("endif")]
    EndIf,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("endfor")]
    EndFor,
    #[token("component_css_dependencies")]
    CssDependencies,
    #[token("component_js_dependencies")]
    JsDependencies,

    // Modifiers
    #[token("not")]
    Not,
    #[token("only")]
    Only,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // Punctuation
    #[token("/")]
    Slash,
    #[token("=")]
    Equals,
    #[token(".")]
    Dot,

    // Literals - identifiers must come after keywords
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Ident(String),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unquote(lex.slice()))]
    Str(String),

    #[regex(r"-?[0-9]+(\.[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),
}

fn unquote(s: &str) -> String {
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Lex a template into tokens with spans
pub fn lex(input: &str) -> Result<Vec<(Token, Span)>, ParseError> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        let Some(offset) = find_tag_start(&input[pos..]) else {
            tokens.push((Token::Text(input[pos..].to_string()), pos..input.len()));
            break;
        };
        let start = pos + offset;
        if start > pos {
            tokens.push((Token::Text(input[pos..start].to_string()), pos..start));
        }

        let (close, open_token, close_token) = match &input[start..start + 2] {
            "{{" => ("}}", Some(Token::VarOpen), Some(Token::VarClose)),
            "{%" => ("%}", Some(Token::BlockOpen), Some(Token::BlockClose)),
            _ => ("#}", None, None),
        };

        let inner_start = start + 2;
        let Some(close_offset) = input[inner_start..].find(close) else {
            return Err(ParseError::Syntax {
                span: start..input.len(),
                message: format!("Unclosed tag, expected '{}'", close),
                expected: vec![format!("'{}'", close)],
            });
        };
        let inner_end = inner_start + close_offset;
        let end = inner_end + 2;

        if let (Some(open_token), Some(close_token)) = (open_token, close_token) {
            tokens.push((open_token, start..inner_start));
            lex_tag(&input[inner_start..inner_end], inner_start, &mut tokens)?;
            tokens.push((close_token, inner_end..end));
        }
        pos = end;
    }

    Ok(tokens)
}

fn find_tag_start(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut from = 0;
    while let Some(i) = s[from..].find('{') {
        let at = from + i;
        if matches!(bytes.get(at + 1), Some(b'{') | Some(b'%') | Some(b'#')) {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

fn lex_tag(
    inner: &str,
    offset: usize,
    tokens: &mut Vec<(Token, Span)>,
) -> Result<(), ParseError> {
    for (tok, span) in Token::lexer(inner).spanned() {
        let span = offset + span.start..offset + span.end;
        match tok {
            Ok(tok) => tokens.push((tok, span)),
            Err(()) => {
                return Err(ParseError::Syntax {
                    message: format!("Unexpected character '{}'", &inner[span.start - offset..span.end - offset]),
                    span,
                    expected: Vec::new(),
                })
            }
        }
    }
    Ok(())
}
