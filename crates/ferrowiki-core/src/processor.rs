use crate::page::Metadata;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::sync::OnceLock;

/// Output of [`render`]: the final HTML, the raw Markdown body (front-matter
/// stripped), and the parsed front-matter fields.
///
/// `html` is derived state only. It is never persisted and is always a pure
/// function of `body` plus the rendering rules.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub html: String,
    pub body: String,
    pub metadata: Metadata,
}

/// Convert raw page text (front-matter + Markdown body) into [`Rendered`].
///
/// The text is split at the first blank line: everything before it is parsed
/// as `key: value` front-matter (repeated keys accumulate in order), the rest
/// is the body. If there is no blank line, or the head block contains a line
/// that is not a front-matter field, the whole input is treated as body.
pub fn render(raw: &str) -> Rendered {
    let text = raw.replace("\r\n", "\n");
    let (metadata, body) = split_front_matter(&text);

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);

    let parser = Parser::new_ext(&body, options);
    let mut markup = String::with_capacity(body.len() * 2);
    html::push_html(&mut markup, parser);

    Rendered {
        html: resolve_wikilinks(&markup),
        body,
        metadata,
    }
}

fn split_front_matter(text: &str) -> (Metadata, String) {
    if let Some((head, rest)) = text.split_once("\n\n") {
        if let Some(metadata) = parse_front_matter(head) {
            return (metadata, rest.to_string());
        }
    }
    (Metadata::new(), text.to_string())
}

/// Parse a front-matter block. Every line must be `key: value` with a key
/// made of `[A-Za-z0-9_-]`; otherwise the block is not front-matter at all.
/// All-or-nothing on purpose: a head paragraph that only partly looks like
/// fields is body text, not a half-valid metadata block.
fn parse_front_matter(head: &str) -> Option<Metadata> {
    let mut metadata = Metadata::new();

    for line in head.lines() {
        let (key, value) = line.split_once(':')?;
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return None;
        }
        metadata.append(key, value.trim());
    }

    Some(metadata)
}

fn wikilink_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\[\s*([^\[\]|]+?)\s*(?:\|\s*([^\[\]]+?)\s*)?\]\]")
            .expect("hardcoded wikilink pattern")
    })
}

fn code_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<code[^>]*>.*?</code>").expect("hardcoded code pattern"))
}

/// Resolve `[[target]]` / `[[target|label]]` occurrences in rendered HTML
/// into anchors on the target's display route.
///
/// Matches inside `<code>` spans are left untouched. Every occurrence is
/// substituted in a single left-to-right pass.
pub fn resolve_wikilinks(markup: &str) -> String {
    let code_spans: Vec<(usize, usize)> = code_span_re()
        .find_iter(markup)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut out = String::with_capacity(markup.len());
    let mut last = 0;

    for caps in wikilink_re().captures_iter(markup) {
        let (Some(m), Some(target)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if code_spans
            .iter()
            .any(|&(start, end)| m.start() >= start && m.end() <= end)
        {
            continue;
        }

        let label = caps.get(2).map_or(target.as_str(), |l| l.as_str());
        out.push_str(&markup[last..m.start()]);
        out.push_str("<a href=\"/");
        out.push_str(&clean_id(target.as_str()));
        out.push_str("/\">");
        out.push_str(label);
        out.push_str("</a>");
        last = m.end();
    }

    out.push_str(&markup[last..]);
    out
}

/// Normalize an arbitrary string into a URL-safe page identifier.
///
/// Runs of 2+ spaces collapse to one, ends are trimmed, the result is
/// lowercased, spaces become underscores, backslashes become forward slashes,
/// and everything outside `[A-Za-z0-9_\-/]` is stripped. Total and
/// idempotent: `clean_id(clean_id(x)) == clean_id(x)` for all inputs.
pub fn clean_id(raw: &str) -> String {
    let mut collapsed = String::with_capacity(raw.len());
    let mut prev_space = false;
    for c in raw.chars() {
        if c == ' ' {
            if !prev_space {
                collapsed.push(c);
            }
            prev_space = true;
        } else {
            collapsed.push(c);
            prev_space = false;
        }
    }

    collapsed
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '\\' => '/',
            c => c,
        })
        .filter(|&c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'))
        .collect()
}
