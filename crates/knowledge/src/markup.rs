//! Rewrites support-article HTML into the markup vocabulary the chat client
//! renders.
//!
//! The transform is pure and idempotent: running it on its own output
//! returns the same string.

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Attributes the chat renderer rejects.
const STRIPPED_ATTRIBUTES: [&str; 7] =
    ["summary", "type", "headers", "frame", "rules", "id", "target"];
const IMAGE_CLASS: &str = "emoticon-icon pill";

struct Patterns {
    caption: Regex,
    start_tag: Regex,
    end_tag: Regex,
    attribute: Regex,
    newline: Regex,
    spaces: Regex,
    space_after_tag: Regex,
    space_before_tag: Regex,
    empty_element: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        caption: compile(r"(?is)<caption\b[^>]*>.*?</caption\s*>"),
        start_tag: compile(r"<([A-Za-z][A-Za-z0-9-]*)([^<>]*)>"),
        end_tag: compile(r"</\s*([A-Za-z][A-Za-z0-9-]*)\s*>"),
        attribute: compile(
            r#"([^\s"'=<>/]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#,
        ),
        newline: compile(r"\r\n|\r|\n|\t"),
        spaces: compile(r" {2,}"),
        space_after_tag: compile(r"> +"),
        space_before_tag: compile(r" +<"),
        empty_element: compile(r"<([A-Za-z][A-Za-z0-9-]*)([^<>]*)></([A-Za-z][A-Za-z0-9-]*)>"),
    })
}

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(error) => panic!("invalid built-in markup pattern `{pattern}`: {error}"),
    }
}

/// Normalizes article HTML. Relative `href`/`src` values are resolved
/// against `base_url`.
pub fn normalize_markup(html: &str, base_url: &str) -> String {
    let patterns = patterns();
    let base_url = base_url.trim_end_matches('/');

    let without_captions = patterns.caption.replace_all(html, "");
    let closed = patterns.end_tag.replace_all(&without_captions, |captures: &Captures<'_>| {
        match display_tag(&captures[1]) {
            Some(name) => format!("</{name}>"),
            None => String::new(),
        }
    });
    let opened = patterns
        .start_tag
        .replace_all(&closed, |captures: &Captures<'_>| rewrite_start_tag(captures, base_url));

    let single_line = patterns.newline.replace_all(&opened, " ");
    let collapsed = patterns.spaces.replace_all(&single_line, " ");
    let trimmed_after = patterns.space_after_tag.replace_all(&collapsed, ">");
    let trimmed = patterns.space_before_tag.replace_all(&trimmed_after, " <");

    let filled = patterns.empty_element.replace_all(trimmed.trim(), |captures: &Captures<'_>| {
        if captures[1].eq_ignore_ascii_case(&captures[3]) {
            format!("<{}{}>&nbsp;</{}>", &captures[1], &captures[2], &captures[3])
        } else {
            captures[0].to_owned()
        }
    });

    filled.into_owned()
}

/// Lowercased display name of a tag; `None` for tags that are unwrapped.
fn display_tag(name: &str) -> Option<String> {
    let name = name.to_ascii_lowercase();
    let mapped = match name.as_str() {
        "p" => return None,
        "section" => "div",
        "abbr" | "samp" => "span",
        "strong" => "b",
        _ => return Some(name),
    };
    Some(mapped.to_owned())
}

fn rewrite_start_tag(captures: &Captures<'_>, base_url: &str) -> String {
    let Some(name) = display_tag(&captures[1]) else {
        return String::new();
    };

    let raw_attributes = captures[2].trim_end();
    let (raw_attributes, self_closing) = match raw_attributes.strip_suffix('/') {
        Some(rest) => (rest, true),
        None => (raw_attributes, false),
    };
    let is_image = name == "img";

    let mut attributes: Vec<(String, Option<String>)> = Vec::new();
    for attribute in patterns().attribute.captures_iter(raw_attributes) {
        let key = attribute[1].to_ascii_lowercase();
        let value = attribute
            .get(2)
            .or_else(|| attribute.get(3))
            .or_else(|| attribute.get(4))
            .map(|value| value.as_str().to_owned());

        if STRIPPED_ATTRIBUTES.contains(&key.as_str()) {
            continue;
        }
        if (key == "width" || key == "height") && (is_image || value.as_deref() == Some("NaN%")) {
            continue;
        }
        if is_image && key == "class" {
            continue;
        }

        let value = match (key.as_str(), value) {
            ("href" | "src", Some(link)) => Some(absolutize(&link, base_url)),
            (_, value) => value,
        };
        attributes.push((key, value));
    }

    if is_image {
        attributes.push(("class".to_owned(), Some(IMAGE_CLASS.to_owned())));
    }

    let mut tag = format!("<{name}");
    for (key, value) in attributes {
        match value {
            Some(value) if value.contains('"') => tag.push_str(&format!(" {key}='{value}'")),
            Some(value) => tag.push_str(&format!(" {key}=\"{value}\"")),
            None => tag.push_str(&format!(" {key}")),
        }
    }
    if self_closing {
        tag.push_str(" /");
    }
    tag.push('>');
    tag
}

fn absolutize(link: &str, base_url: &str) -> String {
    if link.starts_with('/') && !link.starts_with("//") {
        format!("{base_url}{link}")
    } else {
        link.to_owned()
    }
}
