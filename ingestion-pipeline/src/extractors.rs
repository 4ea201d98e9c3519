use std::collections::BTreeMap;

use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
};
use common::{error::AppError, storage::types::index_node::IndexNode};
use futures::{stream, StreamExt, TryStreamExt};
use retrieval_pipeline::LlmClient;
use serde::Deserialize;
use tracing::{debug, info};

const TITLE_SYSTEM_PROMPT: &str = "You infer document titles. Given excerpts from a single \
document, respond with one concise, descriptive title for the whole document. Respond with the \
title only, no quotes and no commentary.";

const QUESTIONS_SYSTEM_PROMPT: &str = "You generate questions a text excerpt can answer. Given \
an excerpt, produce the requested number of specific questions that this excerpt, and this \
excerpt alone, answers.";

const KEYWORDS_SYSTEM_PROMPT: &str = "You extract keywords. Given a text excerpt, list the most \
relevant unique keywords and key phrases, most important first.";

const SUMMARY_SYSTEM_PROMPT: &str = "You summarize text excerpts. Given an excerpt, respond \
with a short summary of the key facts it states. Respond with the summary only.";

/// Characters of node text included per extraction prompt.
const MAX_PROMPT_CHARS: usize = 6_000;

#[derive(Debug, Deserialize)]
struct GeneratedQuestions {
    questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedKeywords {
    keywords: Vec<String>,
}

/// Infers a document-level title from up to `sample_nodes` nodes per source
/// document and writes it into every node of that document.
pub async fn extract_titles(
    llm: &LlmClient,
    model: &str,
    nodes: &mut [IndexNode],
    sample_nodes: usize,
) -> Result<(), AppError> {
    // Group node positions by source document, preserving node order.
    let mut by_document: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (position, node) in nodes.iter().enumerate() {
        let key = node
            .metadata
            .file_path
            .clone()
            .unwrap_or_else(|| node.id.clone());
        by_document.entry(key).or_default().push(position);
    }

    info!(documents = by_document.len(), "extracting document titles");

    for (document, positions) in by_document {
        let sample = positions
            .iter()
            .take(sample_nodes)
            .filter_map(|&position| nodes.get(position))
            .map(|node| truncate(&node.text))
            .collect::<Vec<_>>()
            .join("\n---\n");

        let title = chat_text(
            llm,
            model,
            TITLE_SYSTEM_PROMPT,
            &format!("Excerpts:\n{sample}"),
        )
        .await?;
        let title = title.trim().trim_matches('"').to_string();
        debug!(%document, %title, "inferred document title");

        for position in positions {
            if let Some(node) = nodes.get_mut(position) {
                node.metadata.document_title = Some(title.clone());
            }
        }
    }

    Ok(())
}

/// Generates `questions` representative questions per node.
pub async fn extract_questions(
    llm: &LlmClient,
    model: &str,
    nodes: &mut [IndexNode],
    questions: usize,
) -> Result<(), AppError> {
    info!(nodes = nodes.len(), questions, "extracting questions answered");

    for node in nodes.iter_mut() {
        let user_message = format!(
            "Generate exactly {questions} questions this excerpt answers.\n\nExcerpt:\n{}",
            truncate(&node.text)
        );

        let generated: GeneratedQuestions = chat_structured(
            llm,
            model,
            QUESTIONS_SYSTEM_PROMPT,
            &user_message,
            "questions_answered",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "questions": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["questions"],
                "additionalProperties": false
            }),
        )
        .await?;

        let mut list = generated.questions;
        list.truncate(questions);
        node.metadata.questions_answered = Some(list);
    }

    Ok(())
}

/// Extracts up to `max_keywords` keywords per node.
pub async fn extract_keywords(
    llm: &LlmClient,
    model: &str,
    nodes: &mut [IndexNode],
    max_keywords: usize,
) -> Result<(), AppError> {
    info!(nodes = nodes.len(), max_keywords, "extracting keywords");

    for node in nodes.iter_mut() {
        let user_message = format!(
            "List up to {max_keywords} keywords.\n\nExcerpt:\n{}",
            truncate(&node.text)
        );

        let generated: GeneratedKeywords = chat_structured(
            llm,
            model,
            KEYWORDS_SYSTEM_PROMPT,
            &user_message,
            "keyword_extraction",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "keywords": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["keywords"],
                "additionalProperties": false
            }),
        )
        .await?;

        let mut list = generated.keywords;
        list.truncate(max_keywords);
        node.metadata.keywords = Some(list);
    }

    Ok(())
}

/// Summarizes every node with bounded parallelism, then links each node to
/// its predecessor's summary. Title context from the earlier stage is
/// included in the prompt when present.
pub async fn extract_summaries(
    llm: &LlmClient,
    model: &str,
    nodes: &mut [IndexNode],
    workers: usize,
) -> Result<(), AppError> {
    info!(nodes = nodes.len(), workers, "extracting summaries");

    // Prompts are built up front so the in-flight futures own their data.
    let prompts: Vec<String> = nodes.iter().map(summary_prompt).collect();

    let summaries: Vec<String> = stream::iter(prompts.into_iter().map(|prompt| async move {
        let summary = chat_text(llm, model, SUMMARY_SYSTEM_PROMPT, &prompt).await?;
        Ok::<String, AppError>(summary.trim().to_string())
    }))
    .buffered(workers.max(1))
    .try_collect()
    .await?;

    let mut prev: Option<String> = None;
    for (node, summary) in nodes.iter_mut().zip(summaries) {
        node.metadata.prev_summary = prev.clone();
        node.metadata.summary = Some(summary.clone());
        prev = Some(summary);
    }

    Ok(())
}

async fn chat_text(
    llm: &LlmClient,
    model: &str,
    system: &str,
    user: &str,
) -> Result<String, AppError> {
    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages([
            ChatCompletionRequestSystemMessage::from(system).into(),
            ChatCompletionRequestUserMessage::from(user).into(),
        ])
        .build()?;

    let response = llm.chat().create(request).await?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(AppError::LLMParsing(
            "No content found in LLM response".into(),
        ))
}

async fn chat_structured<T: for<'de> Deserialize<'de>>(
    llm: &LlmClient,
    model: &str,
    system: &str,
    user: &str,
    schema_name: &str,
    schema: serde_json::Value,
) -> Result<T, AppError> {
    let response_format = ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
            description: None,
            name: schema_name.into(),
            schema: Some(schema),
            strict: Some(true),
        },
    };

    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages([
            ChatCompletionRequestSystemMessage::from(system).into(),
            ChatCompletionRequestUserMessage::from(user).into(),
        ])
        .response_format(response_format)
        .build()?;

    let response = llm.chat().create(request).await?;

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(AppError::LLMParsing(
            "No content found in LLM response".into(),
        ))?;

    serde_json::from_str(&content)
        .map_err(|e| AppError::LLMParsing(format!("Failed to parse extractor output: {e}")))
}

fn summary_prompt(node: &IndexNode) -> String {
    let title_context = node
        .metadata
        .document_title
        .as_deref()
        .map(|title| format!("Document title: {title}\n\n"))
        .unwrap_or_default();
    format!("{title_context}Excerpt:\n{}", truncate(&node.text))
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_PROMPT_CHARS {
        return text.to_string();
    }
    text.chars().take(MAX_PROMPT_CHARS).collect()
}
