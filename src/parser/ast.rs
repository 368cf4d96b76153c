//! Abstract Syntax Tree types for the template language

use std::sync::Arc;

use crate::value::Value;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// AST node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Valid identifier (alphanumeric + underscore, starts with letter/_)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A sequence of nodes, shared so fills can be captured without copying
pub type Block = Arc<[Spanned<Node>]>;

/// Root AST node - a parsed template
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub nodes: Block,
}

/// Dotted variable path: `user.address.city`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path(pub Vec<String>);

impl Path {
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Argument value: a literal or a variable reference
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(Path),
}

/// Positional (`name` is None) or keyword argument
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<Spanned<Identifier>>,
    pub value: Spanned<Expr>,
}

/// `key=value` pair on slot/provide tags
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordArg {
    pub name: Spanned<Identifier>,
    pub value: Spanned<Expr>,
}

/// `[not] expr` in `{% if %}`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub negated: bool,
    pub expr: Spanned<Expr>,
}

/// A template node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Raw text, emitted as-is
    Text(String),
    /// `{{ path }}`
    Variable(Path),
    /// `{% if cond %} ... {% else %} ... {% endif %}`
    If {
        condition: Condition,
        then: Block,
        otherwise: Block,
    },
    /// `{% for x in items %} ... {% endfor %}`
    For {
        binding: Spanned<Identifier>,
        iterable: Path,
        body: Block,
    },
    /// `{% component "name" ... %}`
    Component(ComponentTag),
    /// `{% slot "name" ... %}`
    Slot(SlotTag),
    /// `{% fill "name" ... %}`, only meaningful inside a component body
    Fill(FillTag),
    /// `{% provide "key" ... %}`
    Provide(ProvideTag),
    /// `{% component_css_dependencies %}`
    CssDependencies,
    /// `{% component_js_dependencies %}`
    JsDependencies,
}

/// Component invocation
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentTag {
    pub name: Spanned<String>,
    pub args: Vec<Argument>,
    /// `only`: render the child in an isolated environment
    pub only: bool,
    /// None for the self-closing form
    pub body: Option<Block>,
}

/// Slot placeholder declared by a component template
#[derive(Debug, Clone, PartialEq)]
pub struct SlotTag {
    pub name: Spanned<String>,
    pub is_default: bool,
    pub required: bool,
    /// Data handed to the fill via `data="var"`
    pub data: Vec<KeywordArg>,
    pub fallback: Block,
}

/// Caller-supplied slot content
#[derive(Debug, Clone, PartialEq)]
pub struct FillTag {
    pub name: Spanned<String>,
    pub data_var: Option<String>,
    pub fallback_var: Option<String>,
    pub body: Block,
}

/// Provide scope
#[derive(Debug, Clone, PartialEq)]
pub struct ProvideTag {
    pub key: Spanned<String>,
    pub data: Vec<KeywordArg>,
    pub body: Block,
}

impl Node {
    /// True for text consisting only of whitespace
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }
}
