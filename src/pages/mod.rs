use axum::{http::StatusCode, response::Html, routing::get, Router};

use crate::{state::AppState, views::layout};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/contact", get(contact))
        .route("/faq", get(faq))
}

pub async fn home() -> Html<String> {
    layout(
        "Home",
        None,
        "<h1>Welcome to gophr.com</h1>\n    <p>Sign up to keep track of your account.</p>",
    )
}

pub async fn contact() -> Html<String> {
    layout(
        "Contact",
        None,
        "<h1>Contact gophr.com</h1>\n    <p>Email us at <a href=\"mailto:support@gophr.com\">support@gophr.com</a>.</p>",
    )
}

pub async fn faq() -> Html<String> {
    layout(
        "FAQ",
        None,
        "<h1>Common questions about gophr.com</h1>\n    <p>Is it free? Yes.</p>",
    )
}

pub async fn not_found() -> (StatusCode, Html<String>) {
    (
        StatusCode::NOT_FOUND,
        layout(
            "Not Found",
            None,
            "<h1>404: page not found</h1>\n    <p>The page you are looking for does not exist.</p>",
        ),
    )
}
