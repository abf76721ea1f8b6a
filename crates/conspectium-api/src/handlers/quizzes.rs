//! Quiz handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use conspectium_core::{Quiz, QuizResult, QuizStatus};

use crate::auth::CurrentUser;
use crate::handlers::{accept_job, JobView};
use crate::{ApiError, AppState};

/// Body of `POST /api/quizzes`.
#[derive(Debug, Deserialize)]
pub struct CreateQuizBody {
    pub note_id: Uuid,
    /// 1..=50. Defaults to `QUIZ_QUESTION_COUNT`.
    pub question_count: Option<u32>,
}

/// Body of `POST /api/quizzes/:id/results`.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizBody {
    #[serde(default)]
    pub answer_ids: Vec<Uuid>,
}

/// A quiz as shown to the person taking it. Correctness stays server-side.
#[derive(Debug, Serialize)]
pub struct QuizView {
    pub id: Uuid,
    pub note_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub status: QuizStatus,
    pub model_used: Option<String>,
    pub questions: Vec<QuestionView>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub title: String,
    pub position: i32,
    pub answers: Vec<AnswerView>,
}

#[derive(Debug, Serialize)]
pub struct AnswerView {
    pub id: Uuid,
    pub text: String,
    pub position: i32,
}

impl From<Quiz> for QuizView {
    fn from(quiz: Quiz) -> Self {
        Self {
            id: quiz.id,
            note_id: quiz.note_id,
            title: quiz.title,
            description: quiz.description,
            instructions: quiz.instructions,
            status: quiz.status,
            model_used: quiz.model_used,
            questions: quiz
                .questions
                .into_iter()
                .map(|q| QuestionView {
                    id: q.id,
                    title: q.title,
                    position: q.position,
                    answers: q
                        .answers
                        .into_iter()
                        .map(|a| AnswerView {
                            id: a.id,
                            text: a.text,
                            position: a.position,
                        })
                        .collect(),
                })
                .collect(),
            created_at: quiz.created_at,
        }
    }
}

/// Scored submission.
#[derive(Debug, Serialize)]
pub struct QuizResultView {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub score: f64,
    pub correct_answers: i32,
    pub total_questions: i32,
    pub created_at: DateTime<Utc>,
}

impl From<QuizResult> for QuizResultView {
    fn from(result: QuizResult) -> Self {
        Self {
            id: result.id,
            quiz_id: result.quiz_id,
            score: result.score,
            correct_answers: result.correct_answers,
            total_questions: result.total_questions,
            created_at: result.created_at,
        }
    }
}

/// `POST /api/quizzes`: start generating a quiz from a ready note.
pub async fn create_quiz(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    Json(body): Json<CreateQuizBody>,
) -> Result<(StatusCode, Json<JobView>), ApiError> {
    let job = state
        .service
        .create_quiz_job(owner, body.note_id, body.question_count)
        .await?;

    Ok(accept_job(&state, &job).await)
}

/// `GET /api/quizzes/:id`
pub async fn get_quiz(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    Path(quiz_id): Path<Uuid>,
) -> Result<Json<QuizView>, ApiError> {
    let quiz = state.service.get_quiz(owner, quiz_id).await?;
    Ok(Json(QuizView::from(quiz)))
}

/// `POST /api/quizzes/:id/results`: score a submission.
pub async fn submit_quiz(
    State(state): State<AppState>,
    CurrentUser(owner): CurrentUser,
    Path(quiz_id): Path<Uuid>,
    Json(body): Json<SubmitQuizBody>,
) -> Result<Json<QuizResultView>, ApiError> {
    let result = state
        .service
        .submit_quiz(owner, quiz_id, body.answer_ids)
        .await?;
    Ok(Json(QuizResultView::from(result)))
}
