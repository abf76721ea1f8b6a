//! Prompt builders for note and quiz generation.
//!
//! Generated content is Russian; every prompt asks for a single JSON object.

use conspectium_core::NoteVariant;

/// System message shared by all generation calls.
pub const SYSTEM_PROMPT: &str = "Ты помогаешь студентам готовить учебные конспекты и тесты. \
Отвечай строго одним JSON-объектом без пояснений и без обрамления в Markdown.";

fn variant_instruction(variant: NoteVariant) -> &'static str {
    match variant {
        NoteVariant::Full => {
            "Составь максимально подробный конспект: сохрани контекст, определения, примеры \
             и логику изложения. Используй заголовки второго уровня и списки."
        }
        NoteVariant::Brief => {
            "Составь сбалансированный конспект: главное в нескольких абзацах и список \
             ключевых тезисов. Без второстепенных деталей."
        }
        NoteVariant::Compressed => {
            "Составь ультракраткую выжимку: не более семи коротких пунктов списка, \
             только самое важное."
        }
    }
}

/// Prompt for one note variant.
pub fn note_variant_prompt(text: &str, variant: NoteVariant) -> String {
    format!(
        "{instruction}\n\
         Верни JSON вида: {{\"title\": \"строка\", \"markdown\": \"конспект в Markdown\", \
         \"key_points\": [\"основные мысли\"]}}\n\n\
         Текст:\n{text}",
        instruction = variant_instruction(variant),
    )
}

/// Prompt for a quiz of `question_count` questions.
pub fn quiz_prompt(text: &str, question_count: u32) -> String {
    format!(
        "Сформируй тест из {question_count} вопросов по следующему конспекту. \
         Каждый вопрос должен иметь ровно четыре варианта ответа, ровно один из которых \
         верный (поле is_correct). Поле explanation кратко объясняет верный ответ.\n\
         Верни JSON: {{\"title\": \"строка\", \"description\": \"строка\", \
         \"instructions\": \"строка\", \"questions\": [{{\"question\": \"строка\", \
         \"answers\": [{{\"text\": \"строка\", \"is_correct\": true}}], \
         \"explanation\": \"строка\"}}]}}\n\n\
         Конспект:\n{text}"
    )
}
