//! POST /api/ask: relays a student question to the model.

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use common::{
    error::Exposure,
    prompts::{build_system_prompt, build_user_message, StudyMode},
    provider::GenerationRequest,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api_state::ApiState;

pub const SERVER_ERROR_ANSWER: &str = "Sorry, there was a server error.";
pub const BAD_REQUEST_ANSWER: &str = "Sorry, the question could not be read.";
pub const EMPTY_ANSWER: &str = "No answer returned.";

#[derive(Debug, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

/// Citations are never filled in; the field exists for the widget.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    pub source: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
}

impl AskResponse {
    fn text(answer: impl Into<String>) -> Json<Self> {
        Json(Self {
            answer: answer.into(),
            citations: Vec::new(),
        })
    }
}

pub async fn ask(State(state): State<ApiState>, body: Bytes) -> impl IntoResponse {
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        AskRequest::default()
    } else {
        match serde_json::from_slice::<AskRequest>(&body) {
            Ok(input) => input,
            Err(e) => {
                warn!(error = %e, "Unreadable ask payload");
                return (StatusCode::BAD_REQUEST, AskResponse::text(BAD_REQUEST_ANSWER));
            }
        }
    };

    let question = input.question.unwrap_or_default();
    let course = input
        .course
        .filter(|course| !course.trim().is_empty())
        .unwrap_or_else(|| state.config.default_course.clone());
    let mode = StudyMode::parse_lenient(input.mode.as_deref().unwrap_or_default());
    let vector_store_id = state.store_id.current().await.map(|resolved| resolved.id);

    info!(
        course = %course,
        mode = %mode,
        question_bytes = question.len(),
        retrieval = vector_store_id.is_some(),
        "Received ask request"
    );

    let request = GenerationRequest {
        model: state.config.openai_model.clone(),
        system: build_system_prompt(&course, mode, vector_store_id.is_some()),
        user: build_user_message(&course, mode, &question),
        vector_store_id,
    };

    match state.provider.generate(request).await {
        Ok(answer) if answer.trim().is_empty() => (StatusCode::OK, AskResponse::text(EMPTY_ANSWER)),
        Ok(answer) => (StatusCode::OK, AskResponse::text(answer)),
        Err(e) => {
            let report = e.report(SERVER_ERROR_ANSWER, Exposure::Generic);
            error!(detail = %report.log_detail, "Ask request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                AskResponse::text(report.public_message),
            )
        }
    }
}
