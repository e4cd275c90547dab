mod lexer;
mod tags;
mod types;

pub use lexer::{normalize_newlines, tokenize};
pub use tags::{parse_tag, split_tag, Tag};
pub use types::{Node, NodeKind, Position, Token, TokenKind};

use crate::error::TemplateError;

/// Parse normalized template text into a node tree.
pub fn parse_template(name: &str, text: &str) -> Result<Vec<Node>, TemplateError> {
    let tokens = tokenize(text);
    let mut parser = Parser {
        name,
        tokens: &tokens,
        pos: 0,
    };
    let (nodes, end) = parser.parse_until(&[])?;
    if let Some((_, position)) = end {
        return Err(parser.error(position.0, "unexpected closing tag"));
    }
    Ok(nodes)
}

struct Parser<'a> {
    name: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Parse nodes until one of `ends` (or end of input when `ends` is empty).
    fn parse_until(
        &mut self,
        ends: &[Tag],
    ) -> Result<(Vec<Node>, Option<(Tag, Position)>), TemplateError> {
        let mut nodes = Vec::new();

        while let Some(token) = self.tokens.get(self.pos) {
            self.pos += 1;
            match token.kind {
                TokenKind::Comment => {}
                TokenKind::Text => nodes.push(Node {
                    kind: NodeKind::Text(token.contents.clone()),
                    position: token.position,
                }),
                TokenKind::Var => {
                    if token.contents.is_empty() {
                        return Err(self.error(token.position.0, "empty variable tag"));
                    }
                    nodes.push(Node {
                        kind: NodeKind::Variable(token.contents.clone()),
                        position: token.position,
                    });
                }
                TokenKind::Block => {
                    let tag = parse_tag(&token.contents)
                        .map_err(|message| self.error(token.position.0, &message))?;
                    match tag {
                        Tag::Else | Tag::EndIf | Tag::EndFor => {
                            if ends.contains(&tag) {
                                return Ok((nodes, Some((tag, token.position))));
                            }
                            return Err(self.error(token.position.0, "unexpected closing tag"));
                        }
                        Tag::If(condition) => {
                            let (then_branch, end) =
                                self.parse_until(&[Tag::Else, Tag::EndIf])?;
                            let else_branch = match end {
                                Some((Tag::Else, _)) => {
                                    let (branch, end) = self.parse_until(&[Tag::EndIf])?;
                                    if end.is_none() {
                                        return Err(self.error(token.position.0, "unclosed 'if'"));
                                    }
                                    branch
                                }
                                Some(_) => Vec::new(),
                                None => {
                                    return Err(self.error(token.position.0, "unclosed 'if'"))
                                }
                            };
                            nodes.push(Node {
                                kind: NodeKind::If {
                                    condition,
                                    then_branch,
                                    else_branch,
                                },
                                position: token.position,
                            });
                        }
                        Tag::For { target, iterable } => {
                            let (body, end) = self.parse_until(&[Tag::EndFor])?;
                            if end.is_none() {
                                return Err(self.error(token.position.0, "unclosed 'for'"));
                            }
                            nodes.push(Node {
                                kind: NodeKind::For {
                                    target,
                                    iterable,
                                    body,
                                },
                                position: token.position,
                            });
                        }
                        Tag::Include { template, bindings } => nodes.push(Node {
                            kind: NodeKind::Include { template, bindings },
                            position: token.position,
                        }),
                    }
                }
            }
        }

        Ok((nodes, None))
    }

    fn error(&self, position: usize, message: &str) -> TemplateError {
        TemplateError::Syntax {
            name: self.name.to_string(),
            position,
            message: message.to_string(),
        }
    }
}
