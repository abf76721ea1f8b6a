//! Quiz submission scoring.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::QuizQuestion;

/// Outcome of scoring one submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub correct_answers: i32,
    pub total_questions: i32,
    /// `correct / total * 100`, rounded to two decimals. Zero for an empty quiz.
    pub score: f64,
}

/// Score submitted answer ids against a quiz's questions.
///
/// Each distinct submitted id that is a correct answer of one of the quiz's
/// questions counts once. Ids belonging to other quizzes, or to nothing at
/// all, are ignored.
pub fn score_submission(questions: &[QuizQuestion], submitted: &[Uuid]) -> ScoreSummary {
    let correct_ids: HashSet<Uuid> = questions
        .iter()
        .flat_map(|q| q.answers.iter())
        .filter(|a| a.is_correct)
        .map(|a| a.id)
        .collect();

    let correct = submitted
        .iter()
        .collect::<HashSet<_>>()
        .into_iter()
        .filter(|id| correct_ids.contains(id))
        .count() as i32;
    let total = questions.len() as i32;

    let score = if total == 0 {
        0.0
    } else {
        round2(f64::from(correct) / f64::from(total) * 100.0)
    };

    ScoreSummary {
        correct_answers: correct,
        total_questions: total,
        score,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
