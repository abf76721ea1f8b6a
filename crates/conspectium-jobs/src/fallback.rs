//! Deterministic offline generators.
//!
//! Used outside production when the AI backend fails, so local and test
//! environments keep working without credentials. Output depends only on
//! the inputs.

use conspectium_core::{defaults, AudioSource, Note, NoteVariant};
use conspectium_inference::{AnswerDraft, QuestionDraft, QuizDraft, VariantDraft};

use crate::note_generator::{GenerationMode, NoteGeneration};
use crate::quiz_generator::QuizGeneration;

const NO_TRANSCRIPT_SUMMARY: &str = "Не удалось автоматически расшифровать аудио. \
Воспользуйтесь текстовым полем, чтобы добавить конспект вручную, \
или попробуйте повторить загрузку позже.";

const OFFLINE_QUIZ_TITLE: &str = "Черновой тест";
const OFFLINE_QUIZ_DESCRIPTION: &str =
    "Тест создан локально. После успешной генерации обновите вопросы.";
const OFFLINE_QUIZ_EXPLANATION: &str =
    "Ответ отмечен как верный автоматически. Уточните детали вручную.";

/// Split text into sentences at whitespace following `.`, `!` or `?`.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut after_terminal = false;

    for ch in text.chars() {
        if after_terminal && ch.is_whitespace() {
            push_sentence(&mut sentences, &current);
            current.clear();
            after_terminal = false;
            continue;
        }
        after_terminal = matches!(ch, '.' | '!' | '?');
        current.push(ch);
    }
    push_sentence(&mut sentences, &current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
}

fn bullets(lines: &mut Vec<String>, points: &[String]) {
    lines.extend(points.iter().map(|p| format!("- {p}")));
}

/// Synthesize a note from the transcript without calling the AI backend.
///
/// The summary is the first few sentences and the next few become key
/// points. An empty transcript yields a placeholder note that invites manual
/// entry and names the triggering `error`.
pub fn build_local_note(
    note: &Note,
    transcript: &str,
    error: &str,
    audio: Option<&AudioSource>,
    variants: &[NoteVariant],
) -> NoteGeneration {
    let sentences = split_sentences(transcript);

    let title = note
        .display_title()
        .map(String::from)
        .or_else(|| audio.and_then(|a| a.original_filename.clone()))
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| defaults::DEFAULT_NOTE_TITLE.to_string());

    let (summary, key_points) = if sentences.is_empty() {
        (
            NO_TRANSCRIPT_SUMMARY.to_string(),
            vec![
                "Аудиозапись сохранена и будет доступна для повторной обработки.".to_string(),
                format!("Проблема: {error}"),
                "Вы можете вставить текст лекции вручную на странице создания конспекта."
                    .to_string(),
            ],
        )
    } else {
        let summary = sentences
            .iter()
            .take(defaults::OFFLINE_SUMMARY_SENTENCES)
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        let rest: Vec<&String> = sentences
            .iter()
            .skip(defaults::OFFLINE_SUMMARY_SENTENCES)
            .take(defaults::OFFLINE_KEY_POINTS)
            .collect();
        let source: Vec<&String> = if rest.is_empty() {
            sentences
                .iter()
                .take(defaults::OFFLINE_SUMMARY_SENTENCES)
                .collect()
        } else {
            rest
        };
        let points = source
            .into_iter()
            .map(|s| s.chars().take(defaults::OFFLINE_KEY_POINT_CHARS).collect())
            .collect();
        (summary, points)
    };

    let effective: Vec<NoteVariant> = if variants.is_empty() {
        vec![NoteVariant::Brief]
    } else {
        variants.to_vec()
    };
    let top_points: Vec<String> = key_points
        .iter()
        .take(defaults::OFFLINE_KEY_POINTS)
        .cloned()
        .collect();

    let drafts = effective
        .into_iter()
        .map(|variant| {
            let mut lines = vec![format!("# {title}"), String::new()];
            match variant {
                NoteVariant::Full => {
                    lines.push("## Краткое содержание".into());
                    lines.push(summary.clone());
                    if !key_points.is_empty() {
                        lines.push(String::new());
                        lines.push("## Ключевые идеи".into());
                        bullets(&mut lines, &key_points);
                    }
                }
                NoteVariant::Brief => {
                    lines.push("## Главное".into());
                    lines.push(summary.clone());
                    if !top_points.is_empty() {
                        lines.push(String::new());
                        lines.push("## Ключевые тезисы".into());
                        bullets(&mut lines, &top_points);
                    }
                }
                NoteVariant::Compressed => {
                    lines.push("## Выжимка".into());
                    if top_points.is_empty() {
                        lines.push(summary.clone());
                    } else {
                        bullets(&mut lines, &top_points);
                    }
                }
            }
            (
                variant,
                VariantDraft {
                    title: title.clone(),
                    markdown: lines.join("\n"),
                    key_points: key_points.clone(),
                },
            )
        })
        .collect();

    NoteGeneration {
        variants: drafts,
        mode: GenerationMode::Offline,
        error: Some(error.to_string()),
    }
}

/// Synthesize a true/false style quiz from the note's keywords, or from its
/// summary sentences when it has none.
pub fn build_local_quiz(note: &Note, error: &str) -> QuizGeneration {
    let mut points: Vec<String> = note
        .keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect();
    if points.is_empty() {
        points = note
            .summary
            .as_deref()
            .map(split_sentences)
            .unwrap_or_default();
    }
    if points.is_empty() {
        points = vec![
            "Конспект создан в офлайн-режиме. Проверьте содержание вручную.".to_string(),
            "После повторной генерации появятся полноценные вопросы.".to_string(),
        ];
    }

    let questions = points
        .iter()
        .take(defaults::OFFLINE_QUIZ_QUESTIONS)
        .map(|point| QuestionDraft {
            question: format!("Верно ли утверждение: {point}"),
            answers: [
                ("Да, верно", true),
                ("Нет, не упоминалось", false),
                ("Частично", false),
                ("Трудно сказать", false),
            ]
            .into_iter()
            .map(|(text, is_correct)| AnswerDraft {
                text: text.to_string(),
                is_correct,
            })
            .collect(),
            explanation: Some(OFFLINE_QUIZ_EXPLANATION.to_string()),
        })
        .collect();

    QuizGeneration {
        draft: QuizDraft {
            title: note
                .display_title()
                .unwrap_or(OFFLINE_QUIZ_TITLE)
                .to_string(),
            description: Some(OFFLINE_QUIZ_DESCRIPTION.to_string()),
            instructions: None,
            questions,
        },
        mode: GenerationMode::Offline,
        error: Some(error.to_string()),
    }
}
