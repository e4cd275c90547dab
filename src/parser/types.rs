/// Byte span of a token in the newline-normalized template text.
pub type Position = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    Var,     // {{ ... }}
    Block,   // {% ... %}
    Comment, // {# ... #}
}

/// One lexed piece of template source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Text for `Text` tokens, trimmed inner contents for tags
    pub contents: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Text(String),
    Variable(String),
    If {
        condition: String,
        then_branch: Vec<Node>,
        else_branch: Vec<Node>,
    },
    For {
        target: String,
        iterable: String,
        body: Vec<Node>,
    },
    Include {
        template: String,
        bindings: Vec<(String, String)>,
    },
}

/// Parsed template node with the span of the token that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub position: Position,
}

impl Node {
    /// Short type name used for the node's host type.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Text(_) => "TextNode",
            NodeKind::Variable(_) => "VariableNode",
            NodeKind::If { .. } => "IfNode",
            NodeKind::For { .. } => "ForNode",
            NodeKind::Include { .. } => "IncludeNode",
        }
    }

    /// The engine's string form of the node.
    pub fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Text(text) => {
                let head: String = text.chars().take(25).collect();
                format!("<Text Node: '{}'>", head)
            }
            NodeKind::Variable(expr) => format!("<Variable Node: {}>", expr),
            NodeKind::If { condition, .. } => format!("<If node: {}>", condition),
            NodeKind::For {
                target,
                iterable,
                body,
            } => format!(
                "<For Node: for {} in {}, tail_len: {}>",
                target,
                iterable,
                body.len()
            ),
            NodeKind::Include { template, .. } => {
                format!("<IncludeNode: template='{}'>", template)
            }
        }
    }
}
