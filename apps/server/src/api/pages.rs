//! Minimal browser-facing pages for provider redirect flows.

use axum::response::Html;

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body style=\"font-family: sans-serif; text-align: center; margin-top: 4rem;\">\
         <h1>{title}</h1><p>{body}</p></body></html>"
    ))
}

pub fn success(provider: &str) -> Html<String> {
    page(
        "Connected",
        &format!("Your {provider} connection was established. You can close this window."),
    )
}

pub fn error(message: &str) -> Html<String> {
    page("Connection failed", message)
}
