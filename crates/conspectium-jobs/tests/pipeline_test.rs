//! Integration tests for the generation pipeline.
//!
//! Every test runs the full job state machine against the in-memory
//! repository and storage with a scripted AI backend, so no database or
//! network is needed.

use std::sync::Arc;

use conspectium_db::{MemoryGenerationRepository, MemoryStorage, StorageBackend};
use conspectium_inference::mock::{MockAiBackend, MOCK_MODEL};
use conspectium_inference::{AnswerDraft, QuestionDraft, QuizDraft, VariantDraft};
use conspectium_jobs::{
    defaults, AiError, AudioSource, AudioSourceKind, AudioStatus, AudioUpload, CreateNoteRequest,
    Environment, Error, GenerationJob, GenerationRepository, GenerationService, JobKind,
    JobMode, JobStatus, NoteJobOptions, NoteStatus, NoteVariant, PipelineConfig, QuizStatus,
    PLACEHOLDER_TRANSCRIPT, QUIZ_RETRY_HINT, TRANSCRIPTION_RETRY_HINT,
};
use uuid::Uuid;

// ============================================================================
// HELPERS
// ============================================================================

struct Harness {
    repo: Arc<MemoryGenerationRepository>,
    storage: Arc<MemoryStorage>,
    ai: MockAiBackend,
    service: GenerationService,
    owner: Uuid,
}

fn harness_with(ai: MockAiBackend, config: PipelineConfig) -> Harness {
    let repo = Arc::new(MemoryGenerationRepository::new());
    let storage = Arc::new(MemoryStorage::new());
    let service = GenerationService::new(
        repo.clone(),
        storage.clone(),
        Arc::new(ai.clone()),
        config,
    );
    Harness {
        repo,
        storage,
        ai,
        service,
        owner: Uuid::new_v4(),
    }
}

fn harness(ai: MockAiBackend, environment: Environment) -> Harness {
    harness_with(ai, PipelineConfig::default().with_environment(environment))
}

fn variant(title: &str, markdown: &str, points: &[&str]) -> VariantDraft {
    VariantDraft {
        title: title.to_string(),
        markdown: markdown.to_string(),
        key_points: points.iter().map(|p| p.to_string()).collect(),
    }
}

fn text_request(text: &str, variants: &[NoteVariant]) -> CreateNoteRequest {
    CreateNoteRequest {
        initial_text: Some(text.to_string()),
        variants: variants.to_vec(),
        ..Default::default()
    }
}

impl Harness {
    async fn upload(&self) -> AudioSource {
        self.service
            .upload_audio(
                self.owner,
                AudioUpload {
                    kind: AudioSourceKind::Uploaded,
                    filename: Some("lecture.mp3".into()),
                    mime_type: Some("audio/mpeg".into()),
                    data: vec![1, 2, 3, 4],
                },
            )
            .await
            .expect("upload")
    }

    async fn job(&self, id: Uuid) -> GenerationJob {
        self.repo.get_job(id).await.unwrap().expect("job exists")
    }

    async fn audio(&self, id: Uuid) -> AudioSource {
        self.repo
            .get_audio_source(id)
            .await
            .unwrap()
            .expect("audio exists")
    }

    /// Create and process a text note, returning its id.
    async fn ready_note(&self, variants: &[NoteVariant]) -> Uuid {
        let job = self
            .service
            .create_note_job(
                self.owner,
                text_request("Клетка. Ядро. Митохондрия.", variants),
            )
            .await
            .unwrap();
        self.service.process_job(job.id).await.unwrap();
        job.note_id.unwrap()
    }
}

// ============================================================================
// JOB CREATION
// ============================================================================

#[tokio::test]
async fn test_create_requires_audio_or_text() {
    let h = harness(MockAiBackend::new(), Environment::Development);
    let err = h
        .service
        .create_note_job(h.owner, text_request("   ", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_create_normalizes_variants() {
    let h = harness(MockAiBackend::new(), Environment::Development);
    let job = h
        .service
        .create_note_job(h.owner, text_request("Текст.", &[]))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.note_options().variants, vec![NoteVariant::Brief]);

    let note = h.service.get_note(h.owner, job.note_id.unwrap()).await.unwrap();
    assert_eq!(note.status, NoteStatus::Processing);
}

#[tokio::test]
async fn test_foreign_audio_reads_as_missing() {
    let h = harness(MockAiBackend::new(), Environment::Development);
    let audio = h.upload().await;

    let err = h
        .service
        .create_note_job(
            Uuid::new_v4(),
            CreateNoteRequest {
                audio_source_id: Some(audio.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_failed_audio_is_forbidden() {
    let h = harness(
        MockAiBackend::new().with_transcription_failure(AiError::permanent("corrupt file")),
        Environment::Development,
    );
    let audio = h.upload().await;
    let job = h
        .service
        .create_note_job(
            h.owner,
            CreateNoteRequest {
                audio_source_id: Some(audio.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(h.service.process_job(job.id).await.is_err());
    assert_eq!(h.audio(audio.id).await.status, AudioStatus::Failed);

    let err = h
        .service
        .create_note_job(
            h.owner,
            CreateNoteRequest {
                audio_source_id: Some(audio.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
}

#[tokio::test]
async fn test_audio_without_file_or_transcript_is_forbidden() {
    let h = harness(MockAiBackend::new(), Environment::Development);
    let audio = AudioSource::new(h.owner, AudioSourceKind::ExternalUrl);
    h.repo.insert_audio_source(&audio).await.unwrap();

    let err = h
        .service
        .create_note_job(
            h.owner,
            CreateNoteRequest {
                audio_source_id: Some(audio.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
}

// ============================================================================
// NOTE JOBS
// ============================================================================

#[tokio::test]
async fn test_text_note_job_completes() {
    let ai = MockAiBackend::new()
        .with_variant(
            NoteVariant::Full,
            variant("Клетка", "# Клетка\n\nПолный текст", &["ядро"]),
        )
        .with_variant(
            NoteVariant::Brief,
            variant("Клетка кратко", "## Главное\n\n- **Ядро** управляет", &[]),
        );
    let h = harness(ai, Environment::Production);

    let job = h
        .service
        .create_note_job(
            h.owner,
            text_request("Клетка. Ядро.", &[NoteVariant::Full, NoteVariant::Brief]),
        )
        .await
        .unwrap();
    h.service.process_job(job.id).await.unwrap();

    let job = h.job(job.id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.started_at.is_some());
    assert!(job.finished_at.is_some());
    assert_eq!(job.response_payload.as_ref().unwrap()["mode"], "ai");

    let note = h.service.get_note(h.owner, job.note_id.unwrap()).await.unwrap();
    assert_eq!(note.status, NoteStatus::Ready);
    assert!(note.generated_at.is_some());
    assert_eq!(note.title.as_deref(), Some("Клетка"));
    assert_eq!(note.keywords, vec!["ядро".to_string()]);
    assert_eq!(note.summary.as_deref(), Some("Главное Ядро управляет"));
    assert_eq!(note.model_used.as_deref(), Some(MOCK_MODEL));
    assert!(note.compressed_markdown.is_none());
    assert_eq!(h.ai.call_count("generate_note_variant"), 2);
}

#[tokio::test]
async fn test_text_jobs_use_text_backend() {
    let audio_ai = MockAiBackend::new();
    let text_ai = MockAiBackend::new();
    let repo = Arc::new(MemoryGenerationRepository::new());
    let service = GenerationService::new(
        repo.clone(),
        Arc::new(MemoryStorage::new()),
        Arc::new(audio_ai.clone()),
        PipelineConfig::default(),
    )
    .with_text_ai(Arc::new(text_ai.clone()));
    let owner = Uuid::new_v4();

    let job = service
        .create_note_job(owner, text_request("Текст лекции.", &[]))
        .await
        .unwrap();
    service.process_job(job.id).await.unwrap();

    assert_eq!(text_ai.call_count("generate_note_variant"), 1);
    assert_eq!(audio_ai.call_count("generate_note_variant"), 0);
}

#[tokio::test]
async fn test_audio_note_caches_transcript_and_never_retranscribes() {
    let h = harness(
        MockAiBackend::new().with_transcript("Первое. Второе."),
        Environment::Development,
    );
    let audio = h.upload().await;
    assert_eq!(audio.status, AudioStatus::Pending);

    let job = h
        .service
        .create_note_job(
            h.owner,
            CreateNoteRequest {
                audio_source_id: Some(audio.id),
                variants: vec![NoteVariant::Full],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.service.process_job(job.id).await.unwrap();

    let cached = h.audio(audio.id).await;
    assert_eq!(cached.status, AudioStatus::Ready);
    assert_eq!(cached.transcription.as_deref(), Some("Первое. Второе."));
    assert_eq!(cached.metadata["transcription"]["model"], MOCK_MODEL);

    let append = h
        .service
        .create_note_variant_job(h.owner, job.note_id.unwrap(), NoteVariant::Brief)
        .await
        .unwrap();
    assert_eq!(append.audio_source_id, Some(audio.id));
    h.service.process_job(append.id).await.unwrap();

    assert_eq!(h.ai.call_count("transcribe"), 1);
    assert_eq!(h.job(append.id).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_append_keeps_title_and_existing_variants() {
    let ai = MockAiBackend::new()
        .with_variant(NoteVariant::Full, variant("Исходный", "# Полный", &["a"]))
        .with_variant(NoteVariant::Brief, variant("Другой", "## Краткий", &["b"]))
        .with_variant(NoteVariant::Compressed, variant("Третий", "   ", &[]));
    let h = harness(ai, Environment::Production);
    let note_id = h.ready_note(&[NoteVariant::Full]).await;

    let append = h
        .service
        .create_note_variant_job(h.owner, note_id, NoteVariant::Brief)
        .await
        .unwrap();
    h.service.process_job(append.id).await.unwrap();

    let note = h.service.get_note(h.owner, note_id).await.unwrap();
    assert_eq!(note.title.as_deref(), Some("Исходный"));
    assert_eq!(note.full_markdown.as_deref(), Some("# Полный"));
    assert_eq!(note.brief_markdown.as_deref(), Some("## Краткий"));
    assert_eq!(note.summary.as_deref(), Some("Краткий"));
    assert_eq!(note.status, NoteStatus::Ready);

    let raw = note.raw_response.unwrap();
    assert!(raw["variants"].get("full").is_some());
    assert!(raw["variants"].get("brief").is_some());

    // A blank generated variant leaves the field empty rather than clearing
    // anything, and populated variants are never touched.
    let append = h
        .service
        .create_note_variant_job(h.owner, note_id, NoteVariant::Compressed)
        .await
        .unwrap();
    h.service.process_job(append.id).await.unwrap();
    let note = h.service.get_note(h.owner, note_id).await.unwrap();
    assert!(note.compressed_markdown.is_none());
    assert_eq!(note.full_markdown.as_deref(), Some("# Полный"));
    assert_eq!(note.brief_markdown.as_deref(), Some("## Краткий"));
}

#[tokio::test]
async fn test_existing_variant_conflicts() {
    let h = harness(MockAiBackend::new(), Environment::Development);
    let note_id = h.ready_note(&[NoteVariant::Brief]).await;

    let err = h
        .service
        .create_note_variant_job(h.owner, note_id, NoteVariant::Brief)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let err = h
        .service
        .create_note_variant_job(Uuid::new_v4(), note_id, NoteVariant::Full)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_append_failure_leaves_ready_note_unchanged() {
    let ai = MockAiBackend::new()
        .with_variant_failure(NoteVariant::Compressed, AiError::permanent("bad request"));
    let h = harness(ai, Environment::Production);
    let note_id = h.ready_note(&[NoteVariant::Brief]).await;

    let append = h
        .service
        .create_note_variant_job(h.owner, note_id, NoteVariant::Compressed)
        .await
        .unwrap();
    let err = h.service.process_job(append.id).await.unwrap_err();
    assert!(matches!(err, Error::Ai(_)));

    let job = h.job(append.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("bad request"));

    let note = h.service.get_note(h.owner, note_id).await.unwrap();
    assert_eq!(note.status, NoteStatus::Ready);
    assert!(note.brief_markdown.is_some());
}

#[tokio::test]
async fn test_create_failure_in_production_cascades_to_note() {
    let ai = MockAiBackend::new().with_generation_failure(AiError::transient("503"));
    let h = harness(ai, Environment::Production);

    let job = h
        .service
        .create_note_job(h.owner, text_request("Текст.", &[NoteVariant::Full]))
        .await
        .unwrap();
    assert!(h.service.process_job(job.id).await.is_err());

    assert_eq!(h.job(job.id).await.status, JobStatus::Failed);
    let note = h.service.get_note(h.owner, job.note_id.unwrap()).await.unwrap();
    assert_eq!(note.status, NoteStatus::Failed);
}

#[tokio::test]
async fn test_offline_fallback_outside_production() {
    let ai = MockAiBackend::new().with_generation_failure(AiError::transient("429"));
    let h = harness(ai, Environment::Development);

    let job = h
        .service
        .create_note_job(
            h.owner,
            text_request("S1. S2. S3.", &[NoteVariant::Full, NoteVariant::Brief]),
        )
        .await
        .unwrap();
    h.service.process_job(job.id).await.unwrap();

    let job = h.job(job.id).await;
    assert_eq!(job.status, JobStatus::Completed);
    let payload = job.response_payload.unwrap();
    assert_eq!(payload["mode"], "offline");
    assert_eq!(payload["variants"].as_object().unwrap().len(), 2);

    let note = h.service.get_note(h.owner, job.note_id.unwrap()).await.unwrap();
    assert_eq!(note.status, NoteStatus::Ready);
    assert_eq!(note.model_used.as_deref(), Some(defaults::OFFLINE_MODEL_TAG));
    assert!(note.full_markdown.is_some());
    assert!(note.brief_markdown.is_some());
}

#[tokio::test]
async fn test_late_variant_failure_falls_back_for_whole_job() {
    let ai = MockAiBackend::new()
        .with_variant(NoteVariant::Full, variant("AI", "# From AI", &[]))
        .with_variant_failure(NoteVariant::Brief, AiError::permanent("404"));
    let h = harness(ai, Environment::Test);

    let job = h
        .service
        .create_note_job(
            h.owner,
            text_request("Один. Два.", &[NoteVariant::Full, NoteVariant::Brief]),
        )
        .await
        .unwrap();
    h.service.process_job(job.id).await.unwrap();

    let note = h.service.get_note(h.owner, job.note_id.unwrap()).await.unwrap();
    assert_ne!(note.full_markdown.as_deref(), Some("# From AI"));
    assert_eq!(note.model_used.as_deref(), Some(defaults::OFFLINE_MODEL_TAG));
}

#[tokio::test]
async fn test_missing_options_decode_to_full_and_compressed() {
    let h = harness(MockAiBackend::new(), Environment::Development);
    let base = h
        .service
        .create_note_job(h.owner, text_request("Текст.", &[NoteVariant::Brief]))
        .await
        .unwrap();

    let mut job = GenerationJob::new(h.owner, JobKind::Note);
    job.note_id = base.note_id;
    job.options = None;
    h.repo.insert_job(&job).await.unwrap();
    assert_eq!(job.note_options(), NoteJobOptions::default());

    h.service.process_job(job.id).await.unwrap();

    let note = h.service.get_note(h.owner, job.note_id.unwrap()).await.unwrap();
    assert!(note.full_markdown.is_some());
    assert!(note.compressed_markdown.is_some());
    assert!(note.brief_markdown.is_none());
}

#[tokio::test]
async fn test_append_with_malformed_variants_keeps_ready_note() {
    let ai = MockAiBackend::new()
        .with_variant_failure(NoteVariant::Full, AiError::permanent("bad request"));
    let h = harness(ai, Environment::Production);
    let note_id = h.ready_note(&[NoteVariant::Brief]).await;
    let before = h.service.get_note(h.owner, note_id).await.unwrap();

    let mut job = GenerationJob::new(h.owner, JobKind::Note);
    job.note_id = Some(note_id);
    job.options = Some(serde_json::json!({"variants": [], "mode": "append"}));
    h.repo.insert_job(&job).await.unwrap();

    assert!(h.service.process_job(job.id).await.is_err());
    assert_eq!(h.job(job.id).await.status, JobStatus::Failed);

    let note = h.service.get_note(h.owner, note_id).await.unwrap();
    assert_eq!(note.status, NoteStatus::Ready);
    assert_eq!(note.title, before.title);
    assert_eq!(note.brief_markdown, before.brief_markdown);
}

#[tokio::test]
async fn test_completed_job_is_not_reprocessed() {
    let h = harness(MockAiBackend::new(), Environment::Development);
    let job = h
        .service
        .create_note_job(h.owner, text_request("Текст.", &[]))
        .await
        .unwrap();
    h.service.process_job(job.id).await.unwrap();
    h.service.process_job(job.id).await.unwrap();

    assert_eq!(h.ai.call_count("generate_note_variant"), 1);
}

#[tokio::test]
async fn test_unknown_job_is_ignored() {
    let h = harness(MockAiBackend::new(), Environment::Development);
    h.service.process_job(Uuid::new_v4()).await.unwrap();
}

// ============================================================================
// TRANSCRIPTION FAILURES
// ============================================================================

#[tokio::test]
async fn test_transient_transcription_keeps_audio_pending() {
    for environment in [Environment::Development, Environment::Production] {
        let ai = MockAiBackend::new().with_transcription_failure(AiError::transient("overloaded"));
        let h = harness(ai, environment);
        let audio = h.upload().await;

        let job = h
            .service
            .create_note_job(
                h.owner,
                CreateNoteRequest {
                    audio_source_id: Some(audio.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = h.service.process_job(job.id).await.unwrap_err();
        assert!(err.to_string().contains(TRANSCRIPTION_RETRY_HINT));

        let audio = h.audio(audio.id).await;
        assert_eq!(audio.status, AudioStatus::Pending);
        assert_eq!(audio.metadata["transient_error"], "overloaded");
        assert!(audio.metadata.get("transient_at").is_some());

        let job = h.job(job.id).await;
        assert_eq!(job.status, JobStatus::Failed);
        let note = h.service.get_note(h.owner, job.note_id.unwrap()).await.unwrap();
        assert_eq!(note.status, NoteStatus::Failed);
    }
}

#[tokio::test]
async fn test_transient_failure_allows_retry_without_reupload() {
    let ai = MockAiBackend::new().with_transcription_failure(AiError::transient("timeout"));
    let h = harness(ai, Environment::Development);
    let audio = h.upload().await;
    let request = CreateNoteRequest {
        audio_source_id: Some(audio.id),
        ..Default::default()
    };

    let job = h.service.create_note_job(h.owner, request.clone()).await.unwrap();
    assert!(h.service.process_job(job.id).await.is_err());

    // Pending audio stays usable for a fresh job.
    assert!(h.service.create_note_job(h.owner, request).await.is_ok());
}

#[tokio::test]
async fn test_missing_blob_in_append_leaves_audio_untouched() {
    let h = harness(MockAiBackend::new(), Environment::Production);
    let note_id = h.ready_note(&[NoteVariant::Brief]).await;

    let audio = h.upload().await;
    h.storage
        .delete(audio.file_ref.as_deref().unwrap())
        .await
        .unwrap();

    let mut job = GenerationJob::new(h.owner, JobKind::Note);
    job.note_id = Some(note_id);
    job.audio_source_id = Some(audio.id);
    let options = NoteJobOptions::new(&[NoteVariant::Compressed], JobMode::Append);
    job.options = Some(options.to_payload());
    h.repo.insert_job(&job).await.unwrap();

    assert!(h.service.process_job(job.id).await.is_err());
    assert_eq!(h.job(job.id).await.status, JobStatus::Failed);
    assert_eq!(h.audio(audio.id).await.status, AudioStatus::Pending);
    assert_eq!(h.ai.call_count("transcribe"), 0);

    let note = h.service.get_note(h.owner, note_id).await.unwrap();
    assert_eq!(note.status, NoteStatus::Ready);
}

#[tokio::test]
async fn test_permanent_transcription_failure_fails_audio() {
    let ai = MockAiBackend::new().with_transcription_failure(AiError::permanent("unsupported"));
    let h = harness(ai, Environment::Development);
    let audio = h.upload().await;

    let job = h
        .service
        .create_note_job(
            h.owner,
            CreateNoteRequest {
                audio_source_id: Some(audio.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let err = h.service.process_job(job.id).await.unwrap_err();
    assert!(err.to_string().contains("unsupported"));

    assert_eq!(h.audio(audio.id).await.status, AudioStatus::Failed);
    assert_eq!(h.ai.call_count("generate_note_variant"), 0);
}

#[tokio::test]
async fn test_placeholder_transcript_when_opted_in() {
    let ai = MockAiBackend::new().with_transcription_failure(AiError::transient("offline"));
    let h = harness_with(
        ai,
        PipelineConfig::default()
            .with_environment(Environment::Development)
            .with_transcription_placeholder(true),
    );
    let audio = h.upload().await;

    let job = h
        .service
        .create_note_job(
            h.owner,
            CreateNoteRequest {
                audio_source_id: Some(audio.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.service.process_job(job.id).await.unwrap();

    let audio = h.audio(audio.id).await;
    assert_eq!(audio.status, AudioStatus::Ready);
    assert_eq!(audio.transcription.as_deref(), Some(PLACEHOLDER_TRANSCRIPT));
    assert_eq!(h.job(job.id).await.status, JobStatus::Completed);
}

// ============================================================================
// QUIZ JOBS
// ============================================================================

#[tokio::test]
async fn test_quiz_requires_ready_note() {
    let h = harness(MockAiBackend::new(), Environment::Development);
    let job = h
        .service
        .create_note_job(h.owner, text_request("Текст.", &[]))
        .await
        .unwrap();

    let err = h
        .service
        .create_quiz_job(h.owner, job.note_id.unwrap(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotReady(_)));
}

#[tokio::test]
async fn test_quiz_question_count_validated() {
    let h = harness(MockAiBackend::new(), Environment::Development);
    let note_id = h.ready_note(&[]).await;

    for count in [0, defaults::MAX_QUESTION_COUNT + 1] {
        let err = h
            .service
            .create_quiz_job(h.owner, note_id, Some(count))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}

#[tokio::test]
async fn test_quiz_job_completes() {
    let h = harness(MockAiBackend::new(), Environment::Production);
    let note_id = h.ready_note(&[NoteVariant::Brief]).await;

    let job = h
        .service
        .create_quiz_job(h.owner, note_id, Some(3))
        .await
        .unwrap();
    assert_eq!(job.quiz_options().question_count, 3);
    h.service.process_quiz_job(job.id).await.unwrap();

    let quiz = h
        .service
        .get_quiz(h.owner, job.quiz_id.unwrap())
        .await
        .unwrap();
    assert_eq!(quiz.status, QuizStatus::Ready);
    assert_eq!(quiz.questions.len(), 3);
    assert_eq!(quiz.note_id, Some(note_id));
    assert_eq!(quiz.model_used.as_deref(), Some(MOCK_MODEL));
    assert_eq!(h.job(job.id).await.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_quiz_regeneration_replaces_question_set() {
    let h = harness(MockAiBackend::new(), Environment::Development);
    let note_id = h.ready_note(&[]).await;

    let first = h
        .service
        .create_quiz_job(h.owner, note_id, Some(5))
        .await
        .unwrap();
    h.service.process_quiz_job(first.id).await.unwrap();
    let quiz_id = first.quiz_id.unwrap();
    let old_ids: Vec<Uuid> = h
        .service
        .get_quiz(h.owner, quiz_id)
        .await
        .unwrap()
        .questions
        .iter()
        .map(|q| q.id)
        .collect();

    let mut second = GenerationJob::new(h.owner, JobKind::Quiz);
    second.note_id = Some(note_id);
    second.quiz_id = Some(quiz_id);
    second.options = Some(serde_json::json!({"question_count": 2}));
    h.repo.insert_job(&second).await.unwrap();
    h.service.process_quiz_job(second.id).await.unwrap();

    let quiz = h.service.get_quiz(h.owner, quiz_id).await.unwrap();
    assert_eq!(quiz.questions.len(), 2);
    assert!(quiz.questions.iter().all(|q| !old_ids.contains(&q.id)));
    assert!(quiz
        .questions
        .iter()
        .all(|q| q.answers.iter().all(|a| a.question_id == q.id)));
}

#[tokio::test]
async fn test_quiz_offline_fallback_outside_production() {
    let ai = MockAiBackend::new()
        .with_variant(NoteVariant::Brief, variant("Тема", "## Тезисы", &["k1", "k2"]))
        .with_quiz_failure(AiError::permanent("quota"));
    let h = harness(ai, Environment::Development);
    let note_id = h.ready_note(&[NoteVariant::Brief]).await;

    let job = h.service.create_quiz_job(h.owner, note_id, None).await.unwrap();
    h.service.process_quiz_job(job.id).await.unwrap();

    let quiz = h
        .service
        .get_quiz(h.owner, job.quiz_id.unwrap())
        .await
        .unwrap();
    assert_eq!(quiz.status, QuizStatus::Ready);
    assert_eq!(quiz.questions.len(), 2);
    assert_eq!(quiz.model_used.as_deref(), Some(defaults::OFFLINE_MODEL_TAG));
    assert_eq!(quiz.raw_response.unwrap()["mode"], "offline");
}

#[tokio::test]
async fn test_transient_quiz_failure_in_production_fails_quiz_only() {
    let ai = MockAiBackend::new().with_quiz_failure(AiError::transient("503"));
    let h = harness(ai, Environment::Production);
    let note_id = h.ready_note(&[]).await;

    let job = h.service.create_quiz_job(h.owner, note_id, None).await.unwrap();
    let err = h.service.process_quiz_job(job.id).await.unwrap_err();
    assert!(err.to_string().contains(QUIZ_RETRY_HINT));

    let quiz = h
        .service
        .get_quiz(h.owner, job.quiz_id.unwrap())
        .await
        .unwrap();
    assert_eq!(quiz.status, QuizStatus::Failed);

    let note = h.service.get_note(h.owner, note_id).await.unwrap();
    assert_eq!(note.status, NoteStatus::Ready);
}

// ============================================================================
// SCORING
// ============================================================================

#[tokio::test]
async fn test_submission_scores_and_records_result() {
    let quiz = QuizDraft {
        title: "Проверка".into(),
        questions: (1..=4)
            .map(|i| QuestionDraft {
                question: format!("Вопрос {i}"),
                answers: vec![
                    AnswerDraft {
                        text: "верно".into(),
                        is_correct: true,
                    },
                    AnswerDraft {
                        text: "неверно".into(),
                        is_correct: false,
                    },
                ],
                explanation: None,
            })
            .collect(),
        ..Default::default()
    };
    let h = harness(MockAiBackend::new().with_quiz(quiz), Environment::Development);
    let note_id = h.ready_note(&[]).await;
    let job = h.service.create_quiz_job(h.owner, note_id, Some(4)).await.unwrap();
    h.service.process_quiz_job(job.id).await.unwrap();

    let quiz = h
        .service
        .get_quiz(h.owner, job.quiz_id.unwrap())
        .await
        .unwrap();
    let mut submitted: Vec<Uuid> = quiz.questions[..3]
        .iter()
        .map(|q| q.answers.iter().find(|a| a.is_correct).unwrap().id)
        .collect();
    submitted.push(quiz.questions[3].answers[1].id);
    submitted.push(Uuid::new_v4());

    let result = h
        .service
        .submit_quiz(h.owner, quiz.id, submitted)
        .await
        .unwrap();
    assert_eq!(result.score, 75.0);
    assert_eq!(result.correct_answers, 3);
    assert_eq!(result.total_questions, 4);
    assert_eq!(h.repo.quiz_results(quiz.id).unwrap().len(), 1);
}
