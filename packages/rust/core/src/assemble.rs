//! Materialize a document's content from its descriptors.
//!
//! A document is read from its `source`, or concatenated from its content
//! selectors in order, or rendered from a template whose `{{key}}`
//! placeholders are filled with the named sources.

use std::path::Path;

use tracing::warn;

use docsmith_dispatch::Context;
use docsmith_handlers::HandlerRegistry;
use docsmith_shared::Result;
use docsmith_tree::{Content, ContentSelector};

/// Resolve a relative local locator against the directory it was declared in.
pub fn resolve_locator(base: &Path, locator: &str) -> String {
    if locator.contains("://") || Path::new(locator).is_absolute() {
        locator.to_string()
    } else {
        base.join(locator).to_string_lossy().into_owned()
    }
}

/// The locator a document is primarily known by, for reporting.
pub fn primary_locator(content: &Content) -> Option<&str> {
    content
        .source
        .as_deref()
        .filter(|s| !s.is_empty())
        .or_else(|| content.content_selectors.first().map(|cs| cs.source.as_str()))
        .or_else(|| content.template.as_ref().map(|t| t.path.as_str()))
}

/// Read and combine the content of a document node.
pub async fn assemble_content(
    ctx: &Context,
    handlers: &HandlerRegistry,
    base: &Path,
    content: &Content,
) -> Result<Vec<u8>> {
    if let Some(source) = content.source.as_deref().filter(|s| !s.is_empty()) {
        return handlers.read(ctx, &resolve_locator(base, source)).await;
    }

    if !content.content_selectors.is_empty() {
        let mut parts = Vec::with_capacity(content.content_selectors.len());
        for selector in &content.content_selectors {
            parts.push(read_selector(ctx, handlers, base, selector).await?);
        }
        return Ok(parts.join("\n\n").into_bytes());
    }

    if let Some(template) = &content.template {
        let raw = handlers.read(ctx, &resolve_locator(base, &template.path)).await?;
        let mut rendered = String::from_utf8_lossy(&raw).into_owned();
        for (key, selector) in &template.sources {
            let value = read_selector(ctx, handlers, base, selector).await?;
            rendered = rendered.replace(&format!("{{{{{key}}}}}"), &value);
        }
        return Ok(rendered.into_bytes());
    }

    Ok(Vec::new())
}

async fn read_selector(
    ctx: &Context,
    handlers: &HandlerRegistry,
    base: &Path,
    selector: &ContentSelector,
) -> Result<String> {
    let raw = handlers.read(ctx, &resolve_locator(base, &selector.source)).await?;
    let text = String::from_utf8_lossy(&raw).into_owned();
    let Some(anchor) = selector.selector.as_deref() else {
        return Ok(text);
    };
    match select_section(&text, anchor) {
        Some(section) => Ok(section),
        None => {
            warn!(source = %selector.source, selector = %anchor, "selector matched no heading, using whole content");
            Ok(text)
        }
    }
}

/// Extract the section under the heading whose anchor is `selector`
/// (with or without a leading `#`), up to the next heading of the same or a
/// higher level. Headings inside fenced code blocks are ignored.
pub fn select_section(markdown: &str, selector: &str) -> Option<String> {
    let anchor = selector.trim_start_matches('#');
    let mut in_fence = false;
    let mut level: Option<usize> = None;
    let mut section: Vec<&str> = Vec::new();

    for line in markdown.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        let heading = if in_fence { None } else { heading(line) };

        match (level, heading) {
            (None, Some((lvl, text))) if slug(text) == anchor => {
                level = Some(lvl);
                section.push(line);
            }
            (Some(current), Some((lvl, _))) if lvl <= current => break,
            (Some(_), _) => section.push(line),
            _ => {}
        }
    }

    level.map(|_| section.join("\n").trim_end().to_string())
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    Some((hashes, rest.trim()))
}

/// GitHub-style heading anchor.
fn slug(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            c if c.is_alphanumeric() => Some(c.to_lowercase().next().unwrap_or(c)),
            ' ' | '-' => Some('-'),
            '_' => Some('_'),
            _ => None,
        })
        .collect()
}
