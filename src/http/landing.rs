//! Default page served for requests that match no tunnel.

use axum::http::{Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};

use crate::config::LandingConfig;

/// Root page with a title and injected HTML snippets.
#[derive(Debug, Clone)]
pub struct DefaultPage {
    title: String,
    injected: Vec<String>,
}

impl DefaultPage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            injected: Vec::new(),
        }
    }

    pub fn from_config(config: &LandingConfig) -> Self {
        let mut page = Self::new(config.title.clone());
        for html in &config.inject {
            page.inject(html.clone());
        }
        page
    }

    /// Append raw HTML to the root page body.
    pub fn inject(&mut self, html: impl Into<String>) {
        self.injected.push(html.into());
    }

    pub fn render(&self) -> String {
        let title = escape_html(&self.title);
        let mut page = format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n"
        );
        for html in &self.injected {
            page.push_str(html);
            page.push('\n');
        }
        page.push_str("</body>\n</html>\n");
        page
    }

    /// Serve an unmatched request: the page at `/`, 404 elsewhere.
    pub fn respond(&self, method: &Method, uri: &Uri) -> Response {
        let readable = method == Method::GET || method == Method::HEAD;
        if readable && uri.path() == "/" {
            Html(self.render()).into_response()
        } else {
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
