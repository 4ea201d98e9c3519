use std::sync::Arc;

use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
};
use chrono::Utc;
use common::{
    error::AppError,
    storage::types::index_node::{IndexNode, NodeMetadata, ScoredNode},
};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    engine::{first_choice_content, EngineResponse, QueryEngine},
    LlmClient,
};

/// The single tool the decomposition layer can route sub-questions to.
pub const POLICY_TOOL_NAME: &str = "airline_policy_documents";
const POLICY_TOOL_DESCRIPTION: &str =
    "Airline policy documents for answering questions about airline policies and related topics.";

/// Every generated sub-question is prefixed with this instruction so each
/// sub-answer cites quoted sources.
const SUB_QUESTION_PREFIX: &str =
    "Answer in markdown. By first identifying and quoting the most relevant sources, ";

const QUESTION_GEN_SYSTEM_PROMPT: &str = "You generate sub-questions for a question-answering \
system. Given a user question and the available tool, break the question down into the smallest \
set of self-contained sub-questions needed to answer it, each answerable by the tool on its own.";

const COMBINE_SYSTEM_PROMPT: &str = "You are an assistant answering questions about airline \
policies. Combine the provided sub-question answers into a single coherent answer to the \
original question. Do not mention the sub-questions themselves.";

#[derive(Debug, Deserialize)]
struct GeneratedSubQuestions {
    sub_questions: Vec<GeneratedSubQuestion>,
}

#[derive(Debug, Deserialize)]
struct GeneratedSubQuestion {
    #[allow(dead_code)]
    tool_name: String,
    question: String,
}

fn sub_question_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "sub_questions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "tool_name": { "type": "string" },
                        "question": { "type": "string" }
                    },
                    "required": ["tool_name", "question"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["sub_questions"],
        "additionalProperties": false
    })
}

/// Decomposition layer over the base query engine: generates sub-questions,
/// answers them one at a time against the policy-document tool, and
/// synthesizes a combined answer.
///
/// Sequential on purpose: no parallel fan-out, trading latency for
/// LLM-provider rate-limit friendliness.
pub struct SubQuestionEngine {
    base: QueryEngine,
    llm: Arc<LlmClient>,
    model: String,
}

impl SubQuestionEngine {
    pub fn new(base: QueryEngine, llm: Arc<LlmClient>, model: String) -> Self {
        Self { base, llm, model }
    }

    pub async fn query(&self, query: &str) -> Result<EngineResponse, AppError> {
        let sub_questions = self.generate_sub_questions(query).await?;
        info!(count = sub_questions.len(), "generated sub-questions");

        if sub_questions.is_empty() {
            // Nothing to decompose; fall through to the base engine.
            return self.base.query(query).await;
        }

        let mut source_nodes = Vec::new();
        let mut qa_pairs = Vec::new();

        for sub_question in &sub_questions {
            debug!(question = %sub_question, "answering sub-question");
            let response = self.base.query(sub_question).await?;

            // The decomposition layer records its own question/answer pair as
            // a pseudo source node; the response shaper filters these out of
            // the external response.
            source_nodes.push(pseudo_source_node(sub_question, &response.answer));
            source_nodes.extend(response.source_nodes);

            qa_pairs.push((sub_question.clone(), response.answer));
        }

        let answer = self.combine(query, &qa_pairs).await?;

        Ok(EngineResponse {
            answer,
            source_nodes,
        })
    }

    async fn generate_sub_questions(&self, query: &str) -> Result<Vec<String>, AppError> {
        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: Some("Sub-question generator".into()),
                name: "sub_question_generation".into(),
                schema: Some(sub_question_schema()),
                strict: Some(true),
            },
        };

        let user_message = format!(
            "Available tool:\n- {POLICY_TOOL_NAME}: {POLICY_TOOL_DESCRIPTION}\n\n\
             Always prefix each generated question with: '{SUB_QUESTION_PREFIX}'.\n\n\
             User question: {query}"
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(QUESTION_GEN_SYSTEM_PROMPT).into(),
                ChatCompletionRequestUserMessage::from(user_message).into(),
            ])
            .response_format(response_format)
            .build()
            .map_err(AppError::query_failed)?;

        let response = self
            .llm
            .chat()
            .create(request)
            .await
            .map_err(AppError::query_failed)?;

        let content = first_choice_content(response)?;
        parse_sub_questions(&content)
    }

    async fn combine(&self, query: &str, qa_pairs: &[(String, String)]) -> Result<String, AppError> {
        let mut context = String::new();
        for (question, answer) in qa_pairs {
            context.push_str(&format!("Sub question: {question}\nAnswer: {answer}\n\n"));
        }

        let user_message = format!(
            "Sub-question answers:\n==================\n{context}\n\
             Original question:\n==================\n{query}"
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(COMBINE_SYSTEM_PROMPT).into(),
                ChatCompletionRequestUserMessage::from(user_message).into(),
            ])
            .build()
            .map_err(AppError::query_failed)?;

        let response = self
            .llm
            .chat()
            .create(request)
            .await
            .map_err(AppError::query_failed)?;

        first_choice_content(response)
    }
}

fn parse_sub_questions(content: &str) -> Result<Vec<String>, AppError> {
    let generated: GeneratedSubQuestions = serde_json::from_str(content).map_err(|e| {
        AppError::LLMParsing(format!("Failed to parse sub-question generation output: {e}"))
    })?;

    Ok(generated
        .sub_questions
        .into_iter()
        .map(|sq| sq.question)
        .filter(|question| !question.trim().is_empty())
        .collect())
}

/// Internal artifact recording an answered sub-question. Its text starts
/// with "Sub question:" so the shaper can filter it from the API response.
fn pseudo_source_node(question: &str, answer: &str) -> ScoredNode {
    ScoredNode {
        node: IndexNode {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            text: format!("Sub question: {question}\nResponse: {answer}"),
            metadata: NodeMetadata::default(),
            embedding: Vec::new(),
        },
        score: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generated_sub_questions() {
        let content = r#"{"sub_questions": [
            {"tool_name": "airline_policy_documents", "question": "Answer in markdown. By first identifying and quoting the most relevant sources, what is the checked baggage limit?"},
            {"tool_name": "airline_policy_documents", "question": "Answer in markdown. By first identifying and quoting the most relevant sources, what is the refund window?"}
        ]}"#;

        let questions = parse_sub_questions(content).expect("valid payload");
        assert_eq!(questions.len(), 2);
        assert!(questions[0].starts_with(SUB_QUESTION_PREFIX));
    }

    #[test]
    fn blank_questions_are_dropped() {
        let content = r#"{"sub_questions": [
            {"tool_name": "airline_policy_documents", "question": "   "},
            {"tool_name": "airline_policy_documents", "question": "real question"}
        ]}"#;

        let questions = parse_sub_questions(content).expect("valid payload");
        assert_eq!(questions, vec!["real question".to_string()]);
    }

    #[test]
    fn malformed_payload_is_a_parsing_error() {
        let err = parse_sub_questions("not json").expect_err("must fail");
        assert!(matches!(err, AppError::LLMParsing(_)));
    }

    #[test]
    fn pseudo_nodes_carry_the_filter_prefix_and_no_score() {
        let node = pseudo_source_node("what is the pet policy?", "Pets fly in cabin.");
        assert!(node.node.text.starts_with("Sub question:"));
        assert!(node.score.is_none());
        assert!(node.node.metadata.file_name.is_none());
    }
}
