/// Parsed contents of a `{% ... %}` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    If(String),
    Else,
    EndIf,
    For { target: String, iterable: String },
    EndFor,
    Include {
        template: String,
        bindings: Vec<(String, String)>,
    },
}

/// Split tag contents into words, honoring quotes.
///
/// Uses shlex so `include "my page.tmpl"` keeps the quoted name together.
pub fn split_tag(contents: &str) -> Option<Vec<String>> {
    shlex::split(contents)
}

pub fn parse_tag(contents: &str) -> Result<Tag, String> {
    let words = split_tag(contents).ok_or_else(|| format!("unbalanced quotes in '{}'", contents))?;
    let Some((name, args)) = words.split_first() else {
        return Err("empty block tag".to_string());
    };

    match name.as_str() {
        "if" if !args.is_empty() => Ok(Tag::If(args.join(" "))),
        "if" => Err("'if' needs a condition".to_string()),
        "else" => Ok(Tag::Else),
        "endif" => Ok(Tag::EndIf),
        "for" => match args {
            [target, kw, iterable] if kw == "in" => Ok(Tag::For {
                target: target.clone(),
                iterable: iterable.clone(),
            }),
            _ => Err("'for' statements should use the format 'for x in y'".to_string()),
        },
        "endfor" => Ok(Tag::EndFor),
        "include" => parse_include(args),
        other => Err(format!("invalid block tag '{}'", other)),
    }
}

fn parse_include(args: &[String]) -> Result<Tag, String> {
    let Some((template, rest)) = args.split_first() else {
        return Err("'include' takes at least one argument".to_string());
    };

    let bindings = match rest {
        [] => Vec::new(),
        [with, pairs @ ..] if with == "with" && !pairs.is_empty() => pairs
            .iter()
            .map(|pair| {
                pair.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| format!("expected key=value, got '{}'", pair))
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err("'include' options must follow 'with'".to_string()),
    };

    Ok(Tag::Include {
        template: template.clone(),
        bindings,
    })
}
