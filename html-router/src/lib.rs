pub mod error;
pub mod html_state;
mod routes;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use html_state::HtmlState;
use routes::chat::{chat_page, chat_submit};

/// Routes for the browser-facing chat page.
pub fn html_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new()
        .route("/chat", get(chat_page))
        .route("/chat", post(chat_submit))
}
