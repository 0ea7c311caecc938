use pulldown_cmark::{Event, Parser, html};
use serde::Serialize;

use crate::store::ChatTurn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedTurn {
    pub prompt: String,
    pub response: String,
}

/// Markdown to HTML. Raw HTML in the source is escaped, not passed through.
pub fn markdown_to_html(text: &str) -> String {
    let parser = Parser::new(text).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

pub fn render_history(history: &[ChatTurn]) -> Vec<RenderedTurn> {
    history
        .iter()
        .map(|turn| RenderedTurn {
            prompt: turn.prompt.clone(),
            response: markdown_to_html(&turn.response),
        })
        .collect()
}
