//! Quiz, question and result persistence.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use conspectium_core::{Error, Quiz, QuizAnswer, QuizQuestion, QuizResult, QuizStatus, Result};

use crate::jobs::PgGenerationRepository;

pub(crate) const QUIZ_COLUMNS: &str = "id, owner_id, note_id, title, description, instructions, \
     status, model_used, raw_response, created_at, updated_at";

pub(crate) fn parse_quiz_row(row: &PgRow) -> Result<Quiz> {
    Ok(Quiz {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        note_id: row.get("note_id"),
        title: row.get("title"),
        description: row.get("description"),
        instructions: row.get("instructions"),
        status: row.get::<String, _>("status").parse()?,
        model_used: row.get("model_used"),
        raw_response: row.get("raw_response"),
        questions: Vec::new(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

impl PgGenerationRepository {
    pub(crate) async fn fetch_quiz(&self, id: Uuid) -> Result<Option<Quiz>> {
        let row = sqlx::query(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut quiz = parse_quiz_row(&row)?;
        quiz.questions = self.fetch_questions(id).await?;
        Ok(Some(quiz))
    }

    async fn fetch_questions(&self, quiz_id: Uuid) -> Result<Vec<QuizQuestion>> {
        let question_rows = sqlx::query(
            "SELECT id, quiz_id, title, explanation, position FROM quiz_questions \
             WHERE quiz_id = $1 ORDER BY position",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let answer_rows = sqlx::query(
            r#"
            SELECT a.id, a.question_id, a.text, a.is_correct, a.position
              FROM quiz_answers a
              JOIN quiz_questions q ON q.id = a.question_id
             WHERE q.quiz_id = $1
             ORDER BY a.question_id, a.position
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut answers_by_question: HashMap<Uuid, Vec<QuizAnswer>> = HashMap::new();
        for row in answer_rows {
            let answer = QuizAnswer {
                id: row.get("id"),
                question_id: row.get("question_id"),
                text: row.get("text"),
                is_correct: row.get("is_correct"),
                position: row.get("position"),
            };
            answers_by_question
                .entry(answer.question_id)
                .or_default()
                .push(answer);
        }

        Ok(question_rows
            .into_iter()
            .map(|row| {
                let id: Uuid = row.get("id");
                QuizQuestion {
                    id,
                    quiz_id: row.get("quiz_id"),
                    title: row.get("title"),
                    explanation: row.get("explanation"),
                    position: row.get("position"),
                    answers: answers_by_question.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }

    pub(crate) async fn insert_quiz_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        quiz: &Quiz,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO quizzes (
                id, owner_id, note_id, title, description, instructions, status,
                model_used, raw_response, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(quiz.id)
        .bind(quiz.owner_id)
        .bind(quiz.note_id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(&quiz.instructions)
        .bind(quiz.status.as_str())
        .bind(&quiz.model_used)
        .bind(&quiz.raw_response)
        .bind(quiz.created_at)
        .bind(quiz.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    pub(crate) async fn update_quiz_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        quiz: &Quiz,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE quizzes
               SET title = $2,
                   description = $3,
                   instructions = $4,
                   status = $5,
                   model_used = $6,
                   raw_response = $7,
                   updated_at = $8
             WHERE id = $1
            "#,
        )
        .bind(quiz.id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(&quiz.instructions)
        .bind(quiz.status.as_str())
        .bind(&quiz.model_used)
        .bind(&quiz.raw_response)
        .bind(Utc::now())
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("quiz {}", quiz.id)));
        }
        Ok(())
    }

    /// Delete every question (answers cascade) of the quiz and insert
    /// `questions` in their place.
    pub(crate) async fn replace_questions_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        quiz_id: Uuid,
        questions: &[QuizQuestion],
    ) -> Result<()> {
        sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = $1")
            .bind(quiz_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        for question in questions {
            sqlx::query(
                "INSERT INTO quiz_questions (id, quiz_id, title, explanation, position) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(question.id)
            .bind(quiz_id)
            .bind(&question.title)
            .bind(&question.explanation)
            .bind(question.position)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

            for answer in &question.answers {
                sqlx::query(
                    "INSERT INTO quiz_answers (id, question_id, text, is_correct, position) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(answer.id)
                .bind(question.id)
                .bind(&answer.text)
                .bind(answer.is_correct)
                .bind(answer.position)
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;
            }
        }
        Ok(())
    }

    pub(crate) async fn fail_quiz_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE quizzes SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(QuizStatus::Failed.as_str())
            .bind(at)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    pub(crate) async fn insert_quiz_result(&self, result: &QuizResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO quiz_results (
                id, quiz_id, user_id, score, correct_answers, total_questions,
                answers_payload, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(result.id)
        .bind(result.quiz_id)
        .bind(result.user_id)
        .bind(result.score)
        .bind(result.correct_answers)
        .bind(result.total_questions)
        .bind(&result.answers_payload)
        .bind(result.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}
