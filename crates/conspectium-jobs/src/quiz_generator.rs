//! Quiz generation: turning a [`QuizDraft`] into persisted questions.

use serde_json::Value as JsonValue;

use conspectium_core::{defaults, new_v7, Note, Quiz, QuizAnswer, QuizQuestion, QuizStatus};
use conspectium_inference::QuizDraft;

use crate::note_generator::GenerationMode;

/// Output of one quiz job.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizGeneration {
    pub draft: QuizDraft,
    pub mode: GenerationMode,
    pub error: Option<String>,
}

impl QuizGeneration {
    pub fn is_offline(&self) -> bool {
        self.mode == GenerationMode::Offline
    }

    /// The draft as JSON, plus `mode` and the fallback `error` if any.
    pub fn to_payload(&self) -> JsonValue {
        let mut payload = serde_json::to_value(&self.draft).unwrap_or(JsonValue::Null);
        if let Some(object) = payload.as_object_mut() {
            object.insert("mode".into(), JsonValue::from(self.mode.as_str()));
            if let Some(error) = &self.error {
                object.insert("error".into(), JsonValue::from(error.as_str()));
            }
        }
        payload
    }
}

/// Title used when the generated quiz has none.
///
/// `Тест по «<note title>»`, then `Тест по конспекту` for notes created from
/// text, then the generic default.
pub fn fallback_title(note: &Note) -> String {
    if let Some(title) = note.display_title() {
        return format!("Тест по «{title}»");
    }
    if note
        .input_text
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty())
    {
        return "Тест по конспекту".to_string();
    }
    defaults::DEFAULT_QUIZ_TITLE.to_string()
}

/// Build question rows for a quiz, preserving draft order as `position`.
pub fn build_questions(quiz_id: uuid::Uuid, draft: &QuizDraft) -> Vec<QuizQuestion> {
    draft
        .questions
        .iter()
        .enumerate()
        .map(|(idx, q)| {
            let question_id = new_v7();
            let title = q.question.trim();
            QuizQuestion {
                id: question_id,
                quiz_id,
                title: if title.is_empty() {
                    format!("Вопрос {}", idx + 1)
                } else {
                    title.to_string()
                },
                explanation: q
                    .explanation
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(String::from),
                position: idx as i32,
                answers: q
                    .answers
                    .iter()
                    .enumerate()
                    .map(|(a_idx, a)| QuizAnswer {
                        id: new_v7(),
                        question_id,
                        text: a.text.trim().to_string(),
                        is_correct: a.is_correct,
                        position: a_idx as i32,
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Write a generation into the quiz and mark it ready.
///
/// The question set is replaced wholesale; the repository deletes the
/// previous rows when the quiz is saved.
pub fn apply_quiz(quiz: &mut Quiz, note: &Note, generation: &QuizGeneration, model: &str) {
    let draft = &generation.draft;

    quiz.title = match draft.title.trim() {
        "" => fallback_title(note),
        title => title.to_string(),
    };

    quiz.description = non_blank(draft.description.as_deref());
    quiz.instructions = non_blank(draft.instructions.as_deref());
    quiz.model_used = Some(model.to_string());
    quiz.raw_response = Some(generation.to_payload());
    quiz.questions = build_questions(quiz.id, draft);
    quiz.status = QuizStatus::Ready;
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use conspectium_inference::{AnswerDraft, QuestionDraft};
    use uuid::Uuid;

    fn question(text: &str, answers: &[(&str, bool)]) -> QuestionDraft {
        QuestionDraft {
            question: text.to_string(),
            answers: answers
                .iter()
                .map(|(t, c)| AnswerDraft {
                    text: t.to_string(),
                    is_correct: *c,
                })
                .collect(),
            explanation: None,
        }
    }

    #[test]
    fn test_fallback_title_chain() {
        let mut note = Note::new(Uuid::new_v4());
        assert_eq!(fallback_title(&note), "Новый тест");

        note.input_text = Some("текст лекции".into());
        assert_eq!(fallback_title(&note), "Тест по конспекту");

        note.title = Some("Биология".into());
        assert_eq!(fallback_title(&note), "Тест по «Биология»");
    }

    #[test]
    fn test_build_questions_positions_and_defaults() {
        let draft = QuizDraft {
            questions: vec![
                question("Что такое клетка?", &[("Единица жизни", true), ("Орган", false)]),
                question("  ", &[("Да", true)]),
            ],
            ..Default::default()
        };
        let quiz_id = Uuid::new_v4();
        let questions = build_questions(quiz_id, &draft);

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].position, 0);
        assert_eq!(questions[1].position, 1);
        assert_eq!(questions[1].title, "Вопрос 2");
        assert_eq!(questions[0].answers[1].position, 1);
        assert!(questions[0].answers[0].is_correct);
        assert!(questions
            .iter()
            .flat_map(|q| q.answers.iter().map(move |a| (q.id, a.question_id)))
            .all(|(qid, aqid)| qid == aqid));
        assert!(questions.iter().all(|q| q.quiz_id == quiz_id));
    }

    #[test]
    fn test_apply_quiz_uses_fallback_title_and_marks_ready() {
        let mut note = Note::new(Uuid::new_v4());
        note.title = Some("Химия".into());
        let mut quiz = Quiz::new(note.owner_id, "Новый тест");
        let generation = QuizGeneration {
            draft: QuizDraft {
                title: " ".into(),
                description: Some("  ".into()),
                questions: vec![question("Q", &[("A", true)])],
                ..Default::default()
            },
            mode: GenerationMode::Ai,
            error: None,
        };

        apply_quiz(&mut quiz, &note, &generation, "gpt-4o-mini");
        assert_eq!(quiz.title, "Тест по «Химия»");
        assert_eq!(quiz.description, None);
        assert_eq!(quiz.status, QuizStatus::Ready);
        assert_eq!(quiz.model_used.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(quiz.questions.len(), 1);
        assert_eq!(quiz.raw_response.as_ref().unwrap()["mode"], "ai");
    }
}
