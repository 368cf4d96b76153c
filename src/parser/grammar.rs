//! Parser implementation using chumsky

use std::sync::Arc;

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;

use crate::parser::ast::*;
use crate::parser::lexer::Token;
use crate::value::Value;

/// Parse template source into an AST
pub fn parse(input: &str) -> Result<Document, Vec<crate::ParseError>> {
    let len = input.len();

    let tokens = crate::parser::lexer::lex(input).map_err(|e| vec![e])?;
    let token_iter = tokens.into_iter().map(|(tok, span)| (tok, span.into()));

    // Turn the token iterator into a stream that chumsky can use
    let token_stream = Stream::from_iter(token_iter)
        // Split (Token, SimpleSpan) into token and span parts
        .map((len..len).into(), |(t, s): (_, _)| (t, s));

    template_parser()
        .parse(token_stream)
        .into_result()
        .map_err(|errs| errs.into_iter().map(|e| e.into()).collect())
}

/// Helper to extract span range from chumsky's MapExtra
fn span_range(e: &impl chumsky::span::Span<Offset = usize>) -> std::ops::Range<usize> {
    e.start()..e.end()
}

fn block(nodes: Vec<Spanned<Node>>) -> Block {
    Arc::from(nodes)
}

/// Single-segment path used as a bare flag, e.g. `default` in a slot tag
fn flag_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Path(Path(segments)) if segments.len() == 1 => Some(segments[0].as_str()),
        _ => None,
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `{%` followed by a keyword
fn open_tag<'a, I>(keyword: Token) -> impl Parser<'a, I, (), extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    just(Token::BlockOpen).ignore_then(just(keyword)).ignored()
}

/// `{% endxxx %}`
fn end_tag<'a, I>(keyword: Token) -> impl Parser<'a, I, (), extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    just(Token::BlockOpen)
        .ignore_then(just(keyword))
        .ignore_then(just(Token::BlockClose))
        .ignored()
}

fn template_parser<'a, I>() -> impl Parser<'a, I, Document, extra::Err<Rich<'a, Token>>> + Clone
where
    I: ValueInput<'a, Token = Token, Span = SimpleSpan>,
{
    let identifier = select! {
        Token::Ident(s) => Identifier::new(s),
    }
    .map_with(|id, e| Spanned::new(id, span_range(&e.span())));

    let string_literal = select! {
        Token::Str(s) => s,
    }
    .map_with(|s, e| Spanned::new(s, span_range(&e.span())));

    let literal = select! {
        Token::Str(s) => Value::String(s),
        Token::Number(n) => Value::Number(n),
        Token::True => Value::Bool(true),
        Token::False => Value::Bool(false),
    };

    let path = select! {
        Token::Ident(s) => s,
    }
    .separated_by(just(Token::Dot))
    .at_least(1)
    .collect::<Vec<_>>()
    .map(Path);

    let expr = choice((literal.map(Expr::Literal), path.clone().map(Expr::Path)))
        .map_with(|x, e| Spanned::new(x, span_range(&e.span())));

    // Keyword arguments are tried first: `a=b` must not parse as the path `a`
    let argument = choice((
        identifier
            .clone()
            .then_ignore(just(Token::Equals))
            .then(expr.clone())
            .map(|(name, value)| Argument {
                name: Some(name),
                value,
            }),
        expr.clone().map(|value| Argument { name: None, value }),
    ));
    let arguments = argument.repeated().collect::<Vec<_>>();

    let node = recursive(|node| {
        let body = node.clone().repeated().collect::<Vec<_>>().map(block);

        let text = select! {
            Token::Text(s) => Node::Text(s),
        };

        let variable = path
            .clone()
            .delimited_by(just(Token::VarOpen), just(Token::VarClose))
            .map(Node::Variable);

        let condition = just(Token::Not)
            .or_not()
            .then(expr.clone())
            .map(|(not, expr)| Condition {
                negated: not.is_some(),
                expr,
            });

        let if_block = open_tag(Token::If)
            .ignore_then(condition)
            .then_ignore(just(Token::BlockClose))
            .then(body.clone())
            .then(
                open_tag(Token::Else)
                    .ignore_then(just(Token::BlockClose))
                    .ignore_then(body.clone())
                    .or_not(),
            )
            .then_ignore(end_tag(Token::EndIf))
            .map(|((condition, then), otherwise)| Node::If {
                condition,
                then,
                otherwise: otherwise.unwrap_or_else(|| block(Vec::new())),
            });

        let for_block = open_tag(Token::For)
            .ignore_then(identifier.clone())
            .then_ignore(just(Token::In))
            .then(path.clone())
            .then_ignore(just(Token::BlockClose))
            .then(body.clone())
            .then_ignore(end_tag(Token::EndFor))
            .map(|((binding, iterable), body)| Node::For {
                binding,
                iterable,
                body,
            });

        // Component: `{% component "name" args [only] / %}` or with a body
        let component = open_tag(Token::Component)
            .ignore_then(string_literal.clone())
            .then(arguments.clone())
            .then(just(Token::Only).or_not())
            .then(choice((
                just(Token::Slash)
                    .then(just(Token::BlockClose))
                    .to(None::<Block>),
                just(Token::BlockClose)
                    .ignore_then(body.clone())
                    .then_ignore(end_tag(Token::EndComponent))
                    .map(Some),
            )))
            .map(|(((name, args), only), body)| {
                Node::Component(ComponentTag {
                    name,
                    args,
                    only: only.is_some(),
                    body,
                })
            });

        // Slot: bare `default` / `required` flags, everything else is slot data
        let slot = open_tag(Token::Slot)
            .ignore_then(string_literal.clone())
            .then(arguments.clone())
            .then_ignore(just(Token::BlockClose))
            .then(body.clone())
            .then_ignore(end_tag(Token::EndSlot))
            .try_map(|((name, args), fallback), span: SimpleSpan| {
                if name.node.is_empty() {
                    return Err(Rich::custom(span, "slot name must not be empty"));
                }
                let mut tag = SlotTag {
                    name,
                    is_default: false,
                    required: false,
                    data: Vec::new(),
                    fallback,
                };
                for arg in args {
                    match arg.name {
                        Some(name) => tag.data.push(KeywordArg {
                            name,
                            value: arg.value,
                        }),
                        None => match flag_name(&arg.value.node) {
                            Some("default") => tag.is_default = true,
                            Some("required") => tag.required = true,
                            _ => {
                                return Err(Rich::custom(
                                    span,
                                    "slot accepts only 'default', 'required' and key=value data",
                                ))
                            }
                        },
                    }
                }
                Ok(Node::Slot(tag))
            });

        // Fill: `data="var"` and `fallback="var"` name the bindings it exposes
        let fill = open_tag(Token::Fill)
            .ignore_then(string_literal.clone())
            .then(arguments.clone())
            .then_ignore(just(Token::BlockClose))
            .then(body.clone())
            .then_ignore(end_tag(Token::EndFill))
            .try_map(|((name, args), body), span: SimpleSpan| {
                let mut tag = FillTag {
                    name,
                    data_var: None,
                    fallback_var: None,
                    body,
                };
                for arg in args {
                    let var = match &arg.value.node {
                        Expr::Literal(Value::String(s)) if is_identifier(s) => s.clone(),
                        _ => {
                            return Err(Rich::custom(
                                span,
                                "fill options take a quoted variable name",
                            ))
                        }
                    };
                    match arg.name.as_ref().map(|n| n.node.as_str()) {
                        Some("data") => tag.data_var = Some(var),
                        Some("fallback") => tag.fallback_var = Some(var),
                        _ => {
                            return Err(Rich::custom(
                                span,
                                "fill accepts only data=\"...\" and fallback=\"...\"",
                            ))
                        }
                    }
                }
                Ok(Node::Fill(tag))
            });

        let provide = open_tag(Token::Provide)
            .ignore_then(string_literal.clone())
            .then(arguments.clone())
            .then_ignore(just(Token::BlockClose))
            .then(body.clone())
            .then_ignore(end_tag(Token::EndProvide))
            .try_map(|((key, args), body), span: SimpleSpan| {
                if !is_identifier(&key.node) {
                    return Err(Rich::custom(
                        span,
                        format!("provide key '{}' is not a valid identifier", key.node),
                    ));
                }
                let mut data = Vec::new();
                for arg in args {
                    match arg.name {
                        Some(name) => data.push(KeywordArg {
                            name,
                            value: arg.value,
                        }),
                        None => {
                            return Err(Rich::custom(span, "provide accepts only key=value data"))
                        }
                    }
                }
                Ok(Node::Provide(ProvideTag { key, data, body }))
            });

        let css_dependencies = open_tag(Token::CssDependencies)
            .then(just(Token::BlockClose))
            .to(Node::CssDependencies);

        let js_dependencies = open_tag(Token::JsDependencies)
            .then(just(Token::BlockClose))
            .to(Node::JsDependencies);

        choice((
            text,
            variable,
            if_block,
            for_block,
            component,
            slot,
            fill,
            provide,
            css_dependencies,
            js_dependencies,
        ))
        .map_with(|n, e| Spanned::new(n, span_range(&e.span())))
        .boxed()
    });

    // A template is a list of nodes
    node.repeated()
        .collect::<Vec<_>>()
        .then_ignore(end())
        .map(|nodes| Document {
            nodes: block(nodes),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(input: &str) -> Node {
        let doc = parse(input).expect("Should parse");
        assert_eq!(doc.nodes.len(), 1, "expected one node in {:?}", doc.nodes);
        doc.nodes[0].node.clone()
    }

    #[test]
    fn test_parse_text_and_variable() {
        let doc = parse("Hello {{ user.name }}!").expect("Should parse");
        assert_eq!(doc.nodes.len(), 3);
        match &doc.nodes[1].node {
            Node::Variable(p) => assert_eq!(p.to_string(), "user.name"),
            other => panic!("Expected variable, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_self_closing_component() {
        match single(r#"{% component "button" "Save" kind="primary" only / %}"#) {
            Node::Component(c) => {
                assert_eq!(c.name.node, "button");
                assert_eq!(c.args.len(), 2);
                assert!(c.args[0].name.is_none());
                assert_eq!(c.args[1].name.as_ref().unwrap().node.as_str(), "kind");
                assert!(c.only);
                assert!(c.body.is_none());
            }
            other => panic!("Expected component, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_component_with_fills() {
        let input = r#"{% component "card" %}
            {% fill "header" %}Title{% endfill %}
            {% fill "body" data="d" fallback="fb" %}{{ d.x }}{% endfill %}
        {% endcomponent %}"#;
        match single(input) {
            Node::Component(c) => {
                let body = c.body.expect("Should have body");
                let fills: Vec<_> = body
                    .iter()
                    .filter_map(|n| match &n.node {
                        Node::Fill(f) => Some(f.clone()),
                        _ => None,
                    })
                    .collect();
                assert_eq!(fills.len(), 2);
                assert_eq!(fills[1].data_var.as_deref(), Some("d"));
                assert_eq!(fills[1].fallback_var.as_deref(), Some("fb"));
            }
            other => panic!("Expected component, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_slot_flags_and_data() {
        match single(r#"{% slot "content" default required size=3 %}fallback{% endslot %}"#) {
            Node::Slot(s) => {
                assert!(s.is_default);
                assert!(s.required);
                assert_eq!(s.data.len(), 1);
                assert_eq!(s.fallback.len(), 1);
            }
            other => panic!("Expected slot, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_slot_rejects_unknown_flag() {
        assert!(parse(r#"{% slot "content" defualt %}{% endslot %}"#).is_err());
    }

    #[test]
    fn test_parse_if_else() {
        match single("{% if not user %}anon{% else %}{{ user }}{% endif %}") {
            Node::If {
                condition,
                then,
                otherwise,
            } => {
                assert!(condition.negated);
                assert_eq!(then.len(), 1);
                assert_eq!(otherwise.len(), 1);
            }
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_for() {
        match single("{% for item in items %}<li>{{ item }}</li>{% endfor %}") {
            Node::For {
                binding,
                iterable,
                body,
            } => {
                assert_eq!(binding.node.as_str(), "item");
                assert_eq!(iterable.to_string(), "items");
                assert_eq!(body.len(), 3);
            }
            other => panic!("Expected for, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_provide() {
        match single(r#"{% provide "theme" color="red" %}x{% endprovide %}"#) {
            Node::Provide(p) => {
                assert_eq!(p.key.node, "theme");
                assert_eq!(p.data[0].name.node.as_str(), "color");
            }
            other => panic!("Expected provide, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_provide_invalid_key() {
        assert!(parse(r#"{% provide "not valid" x=1 %}{% endprovide %}"#).is_err());
        assert!(parse(r#"{% provide "" x=1 %}{% endprovide %}"#).is_err());
    }

    #[test]
    fn test_parse_dependency_tags() {
        let doc = parse("{% component_css_dependencies %}{% component_js_dependencies %}")
            .expect("Should parse");
        assert_eq!(doc.nodes[0].node, Node::CssDependencies);
        assert_eq!(doc.nodes[1].node, Node::JsDependencies);
    }

    #[test]
    fn test_parse_unclosed_block_is_error() {
        assert!(parse(r#"{% component "card" %}body"#).is_err());
        assert!(parse("{% if x %}yes").is_err());
    }

    #[test]
    fn test_parse_nested_components() {
        let input = r#"{% component "outer" %}{% component "inner" / %}{% endcomponent %}"#;
        match single(input) {
            Node::Component(c) => {
                let body = c.body.unwrap();
                assert!(matches!(body[0].node, Node::Component(_)));
            }
            other => panic!("Expected component, got {:?}", other),
        }
    }
}
