use std::sync::Arc;

use axum::{
    extract::State,
    response::{Html, IntoResponse},
    Form,
};
use common::utils::template_engine::Value;
use minijinja::context;
use retrieval_pipeline::SearchOptions;
use serde::Deserialize;
use tracing::info;

use crate::{error::HtmlError, html_state::HtmlState};

/// The chat page favors answer quality over latency, so decomposition is on
/// by default, unlike the JSON API.
const CHAT_TOP_K: usize = 10;
const CHAT_USE_SUB_QUESTIONS: bool = true;

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    pub message: String,
}

pub async fn chat_page(State(state): State<HtmlState>) -> Result<impl IntoResponse, HtmlError> {
    let body = state.templates.render("chat.html", &Value::from_serialize(()))?;
    Ok(Html(body))
}

pub async fn chat_submit(
    State(state): State<HtmlState>,
    Form(form): Form<ChatForm>,
) -> Result<impl IntoResponse, HtmlError> {
    let message = form.message.trim();
    if message.is_empty() {
        return Err(HtmlError::BadRequest(
            "Please enter a question first.".to_string(),
        ));
    }

    info!("chat question received");

    let response = retrieval_pipeline::search(
        &state.accessor,
        Arc::clone(&state.llm),
        &state.config.model,
        message,
        SearchOptions {
            similarity_top_k: CHAT_TOP_K,
            use_sub_questions: CHAT_USE_SUB_QUESTIONS,
        },
    )
    .await;

    let body = match response {
        Ok(result) => state.templates.render(
            "chat.html",
            &context! {
                query => result.query,
                answer => result.answer,
                results => result.results,
                processing_time_seconds => result.processing_time_seconds,
            },
        )?,
        Err(err) => {
            // Failures render inline on the page instead of replacing it.
            let err = HtmlError::from(err);
            tracing::warn!(error = %err, "chat search failed");
            state.templates.render(
                "chat.html",
                &context! {
                    query => message,
                    error => err.to_string(),
                },
            )?
        }
    };

    Ok(Html(body))
}
