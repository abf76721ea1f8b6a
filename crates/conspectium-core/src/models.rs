//! Domain models for the generation pipeline.
//!
//! All four top-level entities ([`AudioSource`], [`Note`], [`Quiz`],
//! [`GenerationJob`]) are owned by exactly one user. Jobs hold non-owning
//! references to the entities they drive.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;
use crate::error::Error;

/// Implements `as_str`, `Display` and `FromStr` for a unit enum using the
/// same spelling serde uses on the wire.
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $s,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok($ty::$variant),)+
                    other => Err(Error::Serialization(format!(
                        "unknown {} value: {}",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

// =============================================================================
// ENUMS
// =============================================================================

/// How an audio asset entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSourceKind {
    Uploaded,
    Microphone,
    ExternalUrl,
}

string_enum!(AudioSourceKind {
    Uploaded => "uploaded",
    Microphone => "microphone",
    ExternalUrl => "external_url",
});

/// Transcription state of an audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioStatus {
    /// Uploaded, or reset after a transient transcription failure.
    Pending,
    Processing,
    Ready,
    Failed,
}

string_enum!(AudioStatus {
    Pending => "pending",
    Processing => "processing",
    Ready => "ready",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    Draft,
    Processing,
    Ready,
    Failed,
}

string_enum!(NoteStatus {
    Draft => "draft",
    Processing => "processing",
    Ready => "ready",
    Failed => "failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    Processing,
    Ready,
    Failed,
}

string_enum!(QuizStatus {
    Processing => "processing",
    Ready => "ready",
    Failed => "failed",
});

/// Detail level of a note variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteVariant {
    /// Maximum detail and context.
    Full,
    /// Balanced.
    Brief,
    /// Ultra-short bullet digest.
    Compressed,
}

string_enum!(NoteVariant {
    Full => "full",
    Brief => "brief",
    Compressed => "compressed",
});

impl NoteVariant {
    pub const ALL: [NoteVariant; 3] = [NoteVariant::Full, NoteVariant::Brief, NoteVariant::Compressed];

    /// Order in which variants are consulted when deriving the plain summary.
    pub const SUMMARY_PREFERENCE: [NoteVariant; 3] =
        [NoteVariant::Brief, NoteVariant::Compressed, NoteVariant::Full];
}

/// Kind of generation work a job performs.
///
/// `Transcription` exists for record-keeping; transcription always runs
/// inside a note job and is never dispatched on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Transcription,
    Note,
    Quiz,
}

string_enum!(JobKind {
    Transcription => "transcription",
    Note => "note",
    Quiz => "quiz",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

string_enum!(JobStatus {
    Pending => "pending",
    Running => "running",
    Completed => "completed",
    Failed => "failed",
});

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Whether a note job produces the first generation of a note or adds a
/// variant to an existing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    #[default]
    Create,
    Append,
}

string_enum!(JobMode {
    Create => "create",
    Append => "append",
});

// =============================================================================
// ENTITIES
// =============================================================================

/// One uploaded or recorded audio asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSource {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: AudioSourceKind,
    pub original_filename: Option<String>,
    pub mime_type: Option<String>,
    /// Storage key of the blob, relative to the storage backend root.
    pub file_ref: Option<String>,
    pub file_size: Option<i64>,
    pub duration_secs: Option<f64>,
    pub status: AudioStatus,
    /// Cached transcript. Present iff `status == Ready`.
    pub transcription: Option<String>,
    /// Free-form provenance and error traces. Always a JSON object.
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AudioSource {
    pub fn new(owner_id: Uuid, kind: AudioSourceKind) -> Self {
        let now = Utc::now();
        Self {
            id: crate::uuid_utils::new_v7(),
            owner_id,
            kind,
            original_filename: None,
            mime_type: None,
            file_ref: None,
            file_size: None,
            duration_secs: None,
            status: AudioStatus::Pending,
            transcription: None,
            metadata: JsonValue::Object(Default::default()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Cached transcript, ignoring blank values.
    pub fn cached_transcript(&self) -> Option<&str> {
        self.transcription
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    /// Insert `key` into the metadata object, replacing non-object metadata.
    pub fn set_metadata(&mut self, key: &str, value: JsonValue) {
        if !self.metadata.is_object() {
            self.metadata = JsonValue::Object(Default::default());
        }
        if let Some(map) = self.metadata.as_object_mut() {
            map.insert(key.to_string(), value);
        }
    }

    pub fn remove_metadata(&mut self, key: &str) {
        if let Some(map) = self.metadata.as_object_mut() {
            map.remove(key);
        }
    }
}

/// A structured, multi-variant summary ("conspect").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub audio_source_id: Option<Uuid>,
    pub title: Option<String>,
    /// Plain text derived from the most compact variant. Not authoritative.
    pub summary: Option<String>,
    pub full_markdown: Option<String>,
    pub brief_markdown: Option<String>,
    pub compressed_markdown: Option<String>,
    pub keywords: Vec<String>,
    /// Text supplied directly by the user when there is no audio.
    pub input_text: Option<String>,
    pub status: NoteStatus,
    pub model_used: Option<String>,
    /// Per-variant archive of every AI/fallback response for this note.
    pub raw_response: Option<JsonValue>,
    pub generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    pub fn new(owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: crate::uuid_utils::new_v7(),
            owner_id,
            audio_source_id: None,
            title: None,
            summary: None,
            full_markdown: None,
            brief_markdown: None,
            compressed_markdown: None,
            keywords: Vec::new(),
            input_text: None,
            status: NoteStatus::Draft,
            model_used: None,
            raw_response: None,
            generated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn variant_slot(&self, variant: NoteVariant) -> &Option<String> {
        match variant {
            NoteVariant::Full => &self.full_markdown,
            NoteVariant::Brief => &self.brief_markdown,
            NoteVariant::Compressed => &self.compressed_markdown,
        }
    }

    fn variant_slot_mut(&mut self, variant: NoteVariant) -> &mut Option<String> {
        match variant {
            NoteVariant::Full => &mut self.full_markdown,
            NoteVariant::Brief => &mut self.brief_markdown,
            NoteVariant::Compressed => &mut self.compressed_markdown,
        }
    }

    /// Markdown of a variant, treating blank content as absent.
    pub fn variant_markdown(&self, variant: NoteVariant) -> Option<&str> {
        self.variant_slot(variant)
            .as_deref()
            .filter(|md| !md.trim().is_empty())
    }

    pub fn has_variant(&self, variant: NoteVariant) -> bool {
        self.variant_markdown(variant).is_some()
    }

    /// Store generated markdown for a variant.
    ///
    /// Blank markdown is ignored, so an existing variant is never cleared.
    /// Returns whether the field was written.
    pub fn set_variant(&mut self, variant: NoteVariant, markdown: &str) -> bool {
        let trimmed = markdown.trim();
        if trimmed.is_empty() {
            return false;
        }
        *self.variant_slot_mut(variant) = Some(trimmed.to_string());
        true
    }

    /// Non-blank title.
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// A generated or authored question set tied to a note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub note_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub status: QuizStatus,
    pub model_used: Option<String>,
    pub raw_response: Option<JsonValue>,
    /// Ordered by `position`.
    pub questions: Vec<QuizQuestion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quiz {
    pub fn new(owner_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::uuid_utils::new_v7(),
            owner_id,
            note_id: None,
            title: title.into(),
            description: None,
            instructions: None,
            status: QuizStatus::Processing,
            model_used: None,
            raw_response: None,
            questions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub title: String,
    pub explanation: Option<String>,
    pub position: i32,
    /// Ordered by `position`.
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub is_correct: bool,
    pub position: i32,
}

/// A scored quiz submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub user_id: Uuid,
    /// Percentage, rounded to two decimals.
    pub score: f64,
    pub correct_answers: i32,
    pub total_questions: i32,
    /// Answer ids exactly as submitted.
    pub answers_payload: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// The unit of asynchronous generation work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub note_id: Option<Uuid>,
    pub quiz_id: Option<Uuid>,
    pub audio_source_id: Option<Uuid>,
    /// Serialized [`NoteJobOptions`] or [`QuizJobOptions`].
    pub options: Option<JsonValue>,
    pub prompt: Option<String>,
    pub response_payload: Option<JsonValue>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    pub fn new(owner_id: Uuid, kind: JobKind) -> Self {
        Self {
            id: crate::uuid_utils::new_v7(),
            owner_id,
            kind,
            status: JobStatus::Pending,
            note_id: None,
            quiz_id: None,
            audio_source_id: None,
            options: None,
            prompt: None,
            response_payload: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn note_options(&self) -> NoteJobOptions {
        NoteJobOptions::from_payload(self.options.as_ref())
    }

    pub fn quiz_options(&self) -> QuizJobOptions {
        QuizJobOptions::from_payload(self.options.as_ref())
    }
}

// =============================================================================
// JOB OPTIONS
// =============================================================================

/// Options of a note job: which variants to generate, and in which mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteJobOptions {
    pub variants: Vec<NoteVariant>,
    pub mode: JobMode,
}

impl Default for NoteJobOptions {
    /// The decoding fallback: the two widest variants, in create mode.
    fn default() -> Self {
        Self {
            variants: vec![NoteVariant::Full, NoteVariant::Compressed],
            mode: JobMode::Create,
        }
    }
}

impl NoteJobOptions {
    /// Options for a new job, normalizing the requested variant list:
    /// duplicates are dropped preserving order, and an empty request
    /// becomes `[brief]`.
    pub fn new(variants: &[NoteVariant], mode: JobMode) -> Self {
        let mut normalized = dedupe_variants(variants.iter().copied());
        if normalized.is_empty() {
            normalized.push(NoteVariant::Brief);
        }
        Self {
            variants: normalized,
            mode,
        }
    }

    /// Decode options stored on a job row.
    ///
    /// A missing or non-object payload decodes to [`NoteJobOptions::default`].
    /// Otherwise `mode` and `variants` are read independently: unknown
    /// variant names are skipped and an empty or malformed list falls back
    /// to the default variants, while an unknown or absent mode reads as
    /// create.
    pub fn from_payload(payload: Option<&JsonValue>) -> Self {
        let Some(obj) = payload.and_then(|p| p.as_object()) else {
            return Self::default();
        };

        let mode = obj
            .get("mode")
            .and_then(|m| m.as_str())
            .and_then(|m| m.trim().to_lowercase().parse().ok())
            .unwrap_or_default();

        let mut variants = dedupe_variants(
            obj.get("variants")
                .and_then(|v| v.as_array())
                .into_iter()
                .flatten()
                .filter_map(|v| v.as_str())
                .filter_map(|s| s.trim().to_lowercase().parse().ok()),
        );
        if variants.is_empty() {
            variants = Self::default().variants;
        }

        Self { variants, mode }
    }

    pub fn to_payload(&self) -> JsonValue {
        serde_json::json!({
            "variants": self.variants.iter().map(|v| v.as_str()).collect::<Vec<_>>(),
            "mode": self.mode.as_str(),
        })
    }
}

fn dedupe_variants(variants: impl IntoIterator<Item = NoteVariant>) -> Vec<NoteVariant> {
    let mut out = Vec::new();
    for v in variants {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

/// Options of a quiz job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizJobOptions {
    pub question_count: u32,
}

impl Default for QuizJobOptions {
    fn default() -> Self {
        Self {
            question_count: defaults::DEFAULT_QUESTION_COUNT,
        }
    }
}

impl QuizJobOptions {
    pub fn from_payload(payload: Option<&JsonValue>) -> Self {
        payload
            .and_then(|p| p.get("question_count"))
            .and_then(|c| c.as_u64())
            .filter(|c| (1..=defaults::MAX_QUESTION_COUNT as u64).contains(c))
            .map(|c| Self {
                question_count: c as u32,
            })
            .unwrap_or_default()
    }

    pub fn to_payload(&self) -> JsonValue {
        serde_json::json!({ "question_count": self.question_count })
    }
}

/// Everything written when a job fails, applied in one fresh transaction.
///
/// The cascade targets are chosen by the pipeline; the repository applies
/// them as given, except that an audio source already `pending` is left
/// untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFailure {
    pub job_id: Uuid,
    pub error: String,
    pub finished_at: DateTime<Utc>,
    /// Note to mark `failed`.
    pub note_id: Option<Uuid>,
    /// Quiz to mark `failed`.
    pub quiz_id: Option<Uuid>,
    /// Audio source to mark `failed` unless it is `pending`.
    pub audio_source_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_enum_round_trip_spelling() {
        assert_eq!(AudioSourceKind::ExternalUrl.as_str(), "external_url");
        assert_eq!(
            "external_url".parse::<AudioSourceKind>().unwrap(),
            AudioSourceKind::ExternalUrl
        );
        assert_eq!(
            serde_json::to_value(AudioSourceKind::ExternalUrl).unwrap(),
            json!("external_url")
        );
        assert!("bogus".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_note_set_variant_ignores_blank() {
        let mut note = Note::new(Uuid::new_v4());
        assert!(note.set_variant(NoteVariant::Brief, "## Главное"));
        assert!(!note.set_variant(NoteVariant::Brief, "   \n"));
        assert_eq!(note.variant_markdown(NoteVariant::Brief), Some("## Главное"));
    }

    #[test]
    fn test_note_blank_variant_is_absent() {
        let mut note = Note::new(Uuid::new_v4());
        note.full_markdown = Some("  ".to_string());
        assert!(!note.has_variant(NoteVariant::Full));
    }

    #[test]
    fn test_note_options_normalize_dedupes_and_defaults_to_brief() {
        let opts = NoteJobOptions::new(
            &[NoteVariant::Full, NoteVariant::Brief, NoteVariant::Full],
            JobMode::Create,
        );
        assert_eq!(opts.variants, vec![NoteVariant::Full, NoteVariant::Brief]);

        let opts = NoteJobOptions::new(&[], JobMode::Create);
        assert_eq!(opts.variants, vec![NoteVariant::Brief]);
    }

    #[test]
    fn test_note_options_missing_payload_defaults() {
        let opts = NoteJobOptions::from_payload(None);
        assert_eq!(
            opts.variants,
            vec![NoteVariant::Full, NoteVariant::Compressed]
        );
        assert_eq!(opts.mode, JobMode::Create);
    }

    #[test]
    fn test_note_options_malformed_payload_defaults() {
        for payload in [
            json!("not an object"),
            json!({"variants": "full"}),
            json!({"variants": []}),
            json!({"variants": ["nonsense"]}),
        ] {
            assert_eq!(
                NoteJobOptions::from_payload(Some(&payload)),
                NoteJobOptions::default(),
                "payload {payload} should decode to the default"
            );
        }
    }

    #[test]
    fn test_note_options_decode_append() {
        let payload = json!({"variants": ["compressed", "COMPRESSED"], "mode": "append"});
        let opts = NoteJobOptions::from_payload(Some(&payload));
        assert_eq!(opts.variants, vec![NoteVariant::Compressed]);
        assert_eq!(opts.mode, JobMode::Append);
    }

    #[test]
    fn test_note_options_bad_variants_keep_append_mode() {
        for payload in [
            json!({"variants": [], "mode": "append"}),
            json!({"variants": "brief", "mode": "append"}),
            json!({"mode": "append"}),
        ] {
            let opts = NoteJobOptions::from_payload(Some(&payload));
            assert_eq!(opts.mode, JobMode::Append, "payload {payload}");
            assert_eq!(
                opts.variants,
                vec![NoteVariant::Full, NoteVariant::Compressed]
            );
        }
    }

    #[test]
    fn test_note_options_unknown_mode_reads_as_create() {
        let payload = json!({"variants": ["brief"], "mode": "merge"});
        assert_eq!(
            NoteJobOptions::from_payload(Some(&payload)).mode,
            JobMode::Create
        );
    }

    #[test]
    fn test_note_options_payload_round_trip() {
        let opts = NoteJobOptions::new(&[NoteVariant::Brief], JobMode::Append);
        assert_eq!(NoteJobOptions::from_payload(Some(&opts.to_payload())), opts);
    }

    #[test]
    fn test_quiz_options_decode() {
        assert_eq!(
            QuizJobOptions::from_payload(Some(&json!({"question_count": 7}))).question_count,
            7
        );
        assert_eq!(
            QuizJobOptions::from_payload(Some(&json!({"question_count": 0}))).question_count,
            defaults::DEFAULT_QUESTION_COUNT
        );
        assert_eq!(
            QuizJobOptions::from_payload(None).question_count,
            defaults::DEFAULT_QUESTION_COUNT
        );
    }

    #[test]
    fn test_audio_metadata_helpers() {
        let mut audio = AudioSource::new(Uuid::new_v4(), AudioSourceKind::Uploaded);
        audio.metadata = JsonValue::Null;
        audio.set_metadata("transient_error", json!("overloaded"));
        assert_eq!(audio.metadata["transient_error"], "overloaded");
        audio.remove_metadata("transient_error");
        assert!(audio.metadata.get("transient_error").is_none());
    }

    #[test]
    fn test_cached_transcript_ignores_blank() {
        let mut audio = AudioSource::new(Uuid::new_v4(), AudioSourceKind::Microphone);
        audio.transcription = Some(" ".to_string());
        assert!(audio.cached_transcript().is_none());
        audio.transcription = Some("text".to_string());
        assert_eq!(audio.cached_transcript(), Some("text"));
    }
}
