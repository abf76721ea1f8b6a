//! Note variant generation and merge rules.
//!
//! Generation produces a [`NoteGeneration`]; the functions below fold it
//! into a [`Note`] without ever clearing content a previous job wrote.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use conspectium_core::{defaults, AiError, Note, NoteVariant};
use conspectium_inference::{AiBackend, VariantDraft};

use crate::markdown::strip_markdown_with_limit;

/// Where a generation result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Ai,
    Offline,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::Ai => "ai",
            GenerationMode::Offline => "offline",
        }
    }
}

/// Output of one note job: one draft per requested variant, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteGeneration {
    pub variants: Vec<(NoteVariant, VariantDraft)>,
    pub mode: GenerationMode,
    /// Error that triggered the offline fallback.
    pub error: Option<String>,
}

impl NoteGeneration {
    pub fn variant(&self, variant: NoteVariant) -> Option<&VariantDraft> {
        self.variants
            .iter()
            .find(|(v, _)| *v == variant)
            .map(|(_, draft)| draft)
    }

    pub fn is_offline(&self) -> bool {
        self.mode == GenerationMode::Offline
    }

    /// `{"variants": {<variant>: draft}, "mode": .., "error"?: ..}`
    pub fn to_payload(&self) -> JsonValue {
        let mut variants = Map::new();
        for (variant, draft) in &self.variants {
            variants.insert(
                variant.as_str().to_string(),
                serde_json::to_value(draft).unwrap_or(JsonValue::Null),
            );
        }

        let mut payload = Map::new();
        payload.insert("variants".into(), JsonValue::Object(variants));
        payload.insert("mode".into(), JsonValue::from(self.mode.as_str()));
        if let Some(error) = &self.error {
            payload.insert("error".into(), JsonValue::from(error.as_str()));
        }
        JsonValue::Object(payload)
    }
}

/// Call the backend once per variant, sequentially.
///
/// The first failure aborts the whole generation; no partial result is
/// returned.
pub async fn generate_variants(
    ai: &dyn AiBackend,
    text: &str,
    variants: &[NoteVariant],
) -> Result<NoteGeneration, AiError> {
    let mut drafts = Vec::with_capacity(variants.len());
    for &variant in variants {
        debug!(variant = %variant, model = ai.model_name(), "Generating note variant");
        let draft = ai.generate_note_variant(text, variant).await?;
        drafts.push((variant, draft));
    }
    Ok(NoteGeneration {
        variants: drafts,
        mode: GenerationMode::Ai,
        error: None,
    })
}

/// Fold generated variants into the note.
///
/// Blank markdown never clears an existing variant. The title changes only
/// when `allow_title_update` is set and a variant produced a non-blank title.
/// Keywords are replaced by the first variant, in request order, that
/// produced non-blank key points.
pub fn apply_variants(note: &mut Note, generation: &NoteGeneration, allow_title_update: bool) {
    let mut title_taken = false;
    let mut keywords_taken = false;

    for (variant, draft) in &generation.variants {
        note.set_variant(*variant, &draft.markdown);

        let title = draft.title.trim();
        if allow_title_update && !title_taken && !title.is_empty() {
            note.title = Some(title.to_string());
            title_taken = true;
        }

        if !keywords_taken {
            let points: Vec<String> = draft
                .key_points
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
            if !points.is_empty() {
                note.keywords = points;
                keywords_taken = true;
            }
        }
    }
}

/// Re-derive the plain summary from the most compact variant available,
/// falling back to the head of the transcript.
pub fn refresh_summary(note: &mut Note, transcript: Option<&str>, max_length: usize) {
    let preferred = NoteVariant::SUMMARY_PREFERENCE
        .iter()
        .find_map(|v| note.variant_markdown(*v));

    if let Some(markdown) = preferred {
        note.summary = Some(strip_markdown_with_limit(markdown, max_length));
    } else if let Some(text) = transcript.filter(|t| !t.trim().is_empty()) {
        let head: String = text
            .chars()
            .take(defaults::TRANSCRIPT_SUMMARY_FALLBACK_CHARS)
            .collect();
        note.summary = Some(head.trim().to_string());
    }
}

/// Merge a job's response payload into the note's archived raw response.
///
/// Top-level keys of `response` win, except `variants`, which is the union
/// of both maps so earlier variants survive an append job. A stale `error`
/// is dropped when the new response carries none.
pub fn merge_raw_response(existing: Option<&JsonValue>, response: &JsonValue) -> JsonValue {
    let mut merged = existing
        .and_then(|e| e.as_object())
        .cloned()
        .unwrap_or_default();

    let mut variants = merged
        .get("variants")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();
    if let Some(new_variants) = response.get("variants").and_then(|v| v.as_object()) {
        for (key, value) in new_variants {
            variants.insert(key.clone(), value.clone());
        }
    }

    if let Some(object) = response.as_object() {
        if !object.contains_key("error") {
            merged.remove("error");
        }
        for (key, value) in object {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged.insert("variants".into(), JsonValue::Object(variants));
    JsonValue::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn draft(title: &str, markdown: &str, points: &[&str]) -> VariantDraft {
        VariantDraft {
            title: title.to_string(),
            markdown: markdown.to_string(),
            key_points: points.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn generation(variants: Vec<(NoteVariant, VariantDraft)>) -> NoteGeneration {
        NoteGeneration {
            variants,
            mode: GenerationMode::Ai,
            error: None,
        }
    }

    #[test]
    fn test_blank_markdown_never_clears_variant() {
        let mut note = Note::new(Uuid::new_v4());
        note.full_markdown = Some("# Existing".into());

        apply_variants(
            &mut note,
            &generation(vec![(NoteVariant::Full, draft("", "  ", &[]))]),
            true,
        );
        assert_eq!(note.full_markdown.as_deref(), Some("# Existing"));
    }

    #[test]
    fn test_title_gated_by_flag() {
        let mut note = Note::new(Uuid::new_v4());
        note.title = Some("Original".into());
        let gen = generation(vec![(NoteVariant::Brief, draft("New", "## Body", &[]))]);

        apply_variants(&mut note, &gen, false);
        assert_eq!(note.title.as_deref(), Some("Original"));

        apply_variants(&mut note, &gen, true);
        assert_eq!(note.title.as_deref(), Some("New"));
    }

    #[test]
    fn test_first_non_empty_key_points_win() {
        let mut note = Note::new(Uuid::new_v4());
        note.keywords = vec!["old".into()];
        let gen = generation(vec![
            (NoteVariant::Full, draft("", "a", &[" ", ""])),
            (NoteVariant::Brief, draft("", "b", &["first"])),
            (NoteVariant::Compressed, draft("", "c", &["second"])),
        ]);

        apply_variants(&mut note, &gen, true);
        assert_eq!(note.keywords, vec!["first".to_string()]);
    }

    #[test]
    fn test_keywords_kept_when_no_points() {
        let mut note = Note::new(Uuid::new_v4());
        note.keywords = vec!["old".into()];
        apply_variants(
            &mut note,
            &generation(vec![(NoteVariant::Full, draft("", "a", &[]))]),
            true,
        );
        assert_eq!(note.keywords, vec!["old".to_string()]);
    }

    #[test]
    fn test_summary_prefers_brief_then_compressed_then_full() {
        let mut note = Note::new(Uuid::new_v4());
        note.full_markdown = Some("# Full text".into());
        note.compressed_markdown = Some("- Compressed".into());
        refresh_summary(&mut note, None, 400);
        assert_eq!(note.summary.as_deref(), Some("Compressed"));

        note.brief_markdown = Some("## Brief **text**".into());
        refresh_summary(&mut note, None, 400);
        assert_eq!(note.summary.as_deref(), Some("Brief text"));
    }

    #[test]
    fn test_summary_falls_back_to_transcript_head() {
        let mut note = Note::new(Uuid::new_v4());
        let transcript = "x".repeat(500);
        refresh_summary(&mut note, Some(&transcript), 400);
        assert_eq!(
            note.summary.map(|s| s.chars().count()),
            Some(defaults::TRANSCRIPT_SUMMARY_FALLBACK_CHARS)
        );
    }

    #[test]
    fn test_merge_raw_response_unions_variants() {
        let existing = json!({
            "variants": {"full": {"markdown": "F"}},
            "mode": "offline",
            "error": "boom"
        });
        let response = json!({
            "variants": {"brief": {"markdown": "B"}},
            "mode": "ai"
        });

        let merged = merge_raw_response(Some(&existing), &response);
        assert_eq!(merged["variants"]["full"]["markdown"], "F");
        assert_eq!(merged["variants"]["brief"]["markdown"], "B");
        assert_eq!(merged["mode"], "ai");
        assert!(merged.get("error").is_none());
    }

    #[test]
    fn test_merge_raw_response_without_existing() {
        let response = json!({"variants": {"brief": {}}, "mode": "ai"});
        let merged = merge_raw_response(None, &response);
        assert_eq!(merged, response);
    }

    #[test]
    fn test_payload_shape() {
        let gen = NoteGeneration {
            variants: vec![(NoteVariant::Compressed, draft("T", "md", &["p"]))],
            mode: GenerationMode::Offline,
            error: Some("429".into()),
        };
        let payload = gen.to_payload();
        assert_eq!(payload["mode"], "offline");
        assert_eq!(payload["error"], "429");
        assert_eq!(payload["variants"]["compressed"]["markdown"], "md");
    }
}
