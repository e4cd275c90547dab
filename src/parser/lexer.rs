use super::types::{Token, TokenKind};

const TAGS: [(&str, &str, TokenKind); 3] = [
    ("{%", "%}", TokenKind::Block),
    ("{{", "}}", TokenKind::Var),
    ("{#", "#}", TokenKind::Comment),
];

/// Fold `\r\n` and lone `\r` into `\n`, as the engine does before lexing.
pub fn normalize_newlines(source: &str) -> String {
    source.replace("\r\n", "\n").replace('\r', "\n")
}

/// Split normalized template text into text and tag tokens.
///
/// An opening delimiter without its closing partner is kept as text.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0usize;
    let mut text_start = 0usize;

    while pos < text.len() {
        let rest = &text[pos..];
        let tag = TAGS
            .iter()
            .find(|(open, _, _)| rest.starts_with(open))
            .and_then(|(open, close, kind)| {
                rest[open.len()..]
                    .find(close)
                    .map(|inner_len| (open.len(), inner_len, close.len(), *kind))
            });

        match tag {
            Some((open_len, inner_len, close_len, kind)) => {
                if text_start < pos {
                    tokens.push(Token {
                        kind: TokenKind::Text,
                        contents: text[text_start..pos].to_string(),
                        position: (text_start, pos),
                    });
                }
                let end = pos + open_len + inner_len + close_len;
                tokens.push(Token {
                    kind,
                    contents: rest[open_len..open_len + inner_len].trim().to_string(),
                    position: (pos, end),
                });
                pos = end;
                text_start = end;
            }
            None => {
                pos += rest.chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    if text_start < text.len() {
        tokens.push(Token {
            kind: TokenKind::Text,
            contents: text[text_start..].to_string(),
            position: (text_start, text.len()),
        });
    }
    tokens
}
