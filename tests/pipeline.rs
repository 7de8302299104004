//! End-to-end pipeline tests against scripted services.
//!
//! These drive [`process_batch`] and [`push_pending`] through the public
//! API with an in-memory store, a scripted document service, and a scripted
//! DMS, so they exercise the real segmentation, splitting, extraction, and
//! persistence code without any network access.

use async_trait::async_trait;
use invoice_batcher::{
    process_batch, push_pending, BatchConfig, DmsApi, DmsApiError, DmsStatus, DmsUpload,
    DocumentAi, FieldValue, MemoryStore, PipelineError, RecordStore, Sleeper,
};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Scripted services ────────────────────────────────────────────────────

/// Document service returning queued replies in order.
struct ScriptedAi {
    replies: Mutex<VecDeque<Result<String, PipelineError>>>,
}

impl ScriptedAi {
    fn new(replies: Vec<Result<String, PipelineError>>) -> ScriptedAi {
        ScriptedAi {
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl DocumentAi for ScriptedAi {
    async fn analyze(&self, _pdf: &[u8], _instruction: &str) -> Result<String, PipelineError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted service ran out of replies")
    }
}

/// DMS that accepts everything after rejecting the first `reject_first`
/// upload attempts with a 401.
struct ScriptedDms {
    auths: Mutex<usize>,
    uploads: Mutex<Vec<String>>,
    reject_first: usize,
}

impl ScriptedDms {
    fn accepting() -> Arc<ScriptedDms> {
        Arc::new(ScriptedDms {
            auths: Mutex::new(0),
            uploads: Mutex::new(Vec::new()),
            reject_first: 0,
        })
    }
}

#[async_trait]
impl DmsApi for ScriptedDms {
    async fn authenticate(&self, _u: &str, _p: &str) -> Result<String, DmsApiError> {
        let mut auths = self.auths.lock().unwrap();
        *auths += 1;
        Ok(format!("token-{}", *auths))
    }

    async fn upload(&self, _token: &str, upload: DmsUpload) -> Result<(), DmsApiError> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(upload.filename);
        if uploads.len() <= self.reject_first {
            return Err(DmsApiError::Unauthorized);
        }
        Ok(())
    }
}

/// Records pauses instead of sleeping, keeping tests instant.
#[derive(Default)]
struct RecordingSleeper {
    pauses: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

/// Minimal valid PDF with one page per text string.
fn sample_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for text in pages {
        let content = format!("BT /F1 12 Tf 50 700 Td ({text}) Tj ET");
        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            content.into_bytes(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn write_bundle(dir: &Path, pages: &[&str]) -> std::path::PathBuf {
    let path = dir.join("bundle.pdf");
    std::fs::write(&path, sample_pdf(pages)).unwrap();
    path
}

fn config(output_dir: &Path, sleeper: Arc<dyn Sleeper>) -> BatchConfig {
    BatchConfig::builder()
        .fields(["Invoice Number", "Vendor", "Total Amount"])
        .output_dir(output_dir)
        .base_delay_ms(100)
        .throttle_ms(3000)
        .sleeper(sleeper)
        .build()
        .unwrap()
}

const RANGES_TWO: &str = r#"[{"start": 1, "end": 2}, {"start": 3, "end": 3}]"#;
const INVOICE_A: &str = r#"{"Invoice Number": "INV-1", "Vendor": "Acme", "Total Amount": "$100.50"}"#;
const INVOICE_B: &str = r#"{"Invoice Number": "INV-2", "Vendor": "Globex", "Total Amount": 250}"#;

// ── process_batch ────────────────────────────────────────────────────────

#[tokio::test]
async fn full_batch_produces_one_record_per_invoice() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_bundle(dir.path(), &["a1", "a2", "b1"]);
    let out = dir.path().join("uploads");

    let ai = ScriptedAi::new(vec![
        Ok(RANGES_TWO.into()),
        Ok(INVOICE_A.into()),
        Ok(INVOICE_B.into()),
    ]);
    let store = MemoryStore::new();
    let cfg = config(&out, Arc::new(RecordingSleeper::default()));

    let output = process_batch(&input, &ai, &store, &cfg).await.unwrap();

    assert_eq!(output.stats.ranges, 2);
    assert_eq!(output.stats.persisted, 2);
    assert_eq!(output.stats.failed, 0);
    assert_eq!(output.records.len(), 2);

    // Split files are on disk under the output directory.
    for record in &output.records {
        assert!(out.join(&record.pdf_filename).exists());
        assert_eq!(record.dms_status, DmsStatus::Pending);
    }

    // Fields come back typed: amounts as numbers, the rest as text.
    let first = &output.records[0];
    assert_eq!(
        first.details.get("Invoice Number"),
        Some(&FieldValue::Text("INV-1".into()))
    );
    assert_eq!(
        first.details.get("Total Amount"),
        Some(&FieldValue::Number(100.50))
    );
    assert_eq!(
        output.records[1].details.get("Total Amount"),
        Some(&FieldValue::Number(250.0))
    );

    // The split respected the ranges.
    let pages: Vec<usize> = {
        let d = Document::load(out.join(&output.records[0].pdf_filename)).unwrap();
        vec![d.get_pages().len()]
    };
    assert_eq!(pages, vec![2]);
}

#[tokio::test]
async fn rate_limited_calls_back_off_with_doubling_delays() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_bundle(dir.path(), &["a1"]);

    let rate_limited = || PipelineError::RateLimited {
        detail: "HTTP 429".into(),
    };
    let ai = ScriptedAi::new(vec![
        Err(rate_limited()),
        Err(rate_limited()),
        Ok(r#"[{"start": 1, "end": 1}]"#.into()),
        Ok(INVOICE_A.into()),
    ]);
    let store = MemoryStore::new();
    let sleeper = Arc::new(RecordingSleeper::default());
    let cfg = config(&dir.path().join("uploads"), sleeper.clone());

    let output = process_batch(&input, &ai, &store, &cfg).await.unwrap();

    assert_eq!(output.stats.persisted, 1);
    assert_eq!(
        *sleeper.pauses.lock().unwrap(),
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
}

#[tokio::test]
async fn one_bad_document_does_not_sink_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_bundle(dir.path(), &["a1", "b1", "c1"]);

    let ai = ScriptedAi::new(vec![
        Ok(r#"[{"start": 1, "end": 1}, {"start": 2, "end": 2}, {"start": 3, "end": 3}]"#.into()),
        Ok(INVOICE_A.into()),
        Ok("this is not json".into()),
        Ok(INVOICE_B.into()),
    ]);
    let store = MemoryStore::new();
    let cfg = config(
        &dir.path().join("uploads"),
        Arc::new(RecordingSleeper::default()),
    );

    let output = process_batch(&input, &ai, &store, &cfg).await.unwrap();

    assert_eq!(output.stats.persisted, 2);
    assert_eq!(output.stats.failed, 1);
    assert_eq!(output.documents.len(), 3);
    assert!(output.documents[0].error.is_none());
    assert!(output.documents[1].error.is_some());
    assert!(output.documents[2].error.is_none());
    assert_eq!(store.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn every_document_failing_fails_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_bundle(dir.path(), &["a1", "b1"]);

    let ai = ScriptedAi::new(vec![
        Ok(r#"[{"start": 1, "end": 1}, {"start": 2, "end": 2}]"#.into()),
        Ok("garbage".into()),
        Ok("also garbage".into()),
    ]);
    let store = MemoryStore::new();
    let cfg = config(
        &dir.path().join("uploads"),
        Arc::new(RecordingSleeper::default()),
    );

    let err = process_batch(&input, &ai, &store, &cfg).await;
    assert!(matches!(
        err,
        Err(PipelineError::AllDocumentsFailed { total: 2 })
    ));
}

#[tokio::test]
async fn non_pdf_input_is_rejected_before_any_service_call() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("not.pdf");
    std::fs::write(&input, b"just some text").unwrap();

    let ai = ScriptedAi::new(vec![]);
    let store = MemoryStore::new();
    let cfg = config(
        &dir.path().join("uploads"),
        Arc::new(RecordingSleeper::default()),
    );

    let err = process_batch(&input, &ai, &store, &cfg).await;
    assert!(matches!(err, Err(PipelineError::NotAPdf { .. })));
}

#[tokio::test]
async fn empty_field_list_is_rejected_before_any_service_call() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_bundle(dir.path(), &["a1"]);

    // An exhausted script panics if consulted, so reaching the service
    // would fail the test.
    let ai = ScriptedAi::new(vec![]);
    let store = MemoryStore::new();
    let cfg = BatchConfig::builder()
        .output_dir(dir.path().join("uploads"))
        .sleeper(Arc::new(RecordingSleeper::default()))
        .build()
        .unwrap();

    let err = process_batch(&input, &ai, &store, &cfg).await;
    assert!(matches!(err, Err(PipelineError::InvalidConfig(_))));
    assert!(store.list().await.unwrap().is_empty());
}

// ── process_batch + push_pending ─────────────────────────────────────────

fn with_dms(mut cfg: BatchConfig) -> BatchConfig {
    cfg.dms = Some(invoice_batcher::DmsConfig {
        base_url: "https://dms.example.com".into(),
        username: "user".into(),
        password: "pass".into(),
        doc_type_id: "42".into(),
        checker_id: None,
    });
    cfg
}

#[tokio::test]
async fn push_uploads_pending_records_and_marks_them() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_bundle(dir.path(), &["a1", "a2", "b1"]);
    let out = dir.path().join("uploads");

    let ai = ScriptedAi::new(vec![
        Ok(RANGES_TWO.into()),
        Ok(INVOICE_A.into()),
        Ok(INVOICE_B.into()),
    ]);
    let store = MemoryStore::new();
    let sleeper = Arc::new(RecordingSleeper::default());
    let cfg = with_dms(config(&out, sleeper.clone()));

    process_batch(&input, &ai, &store, &cfg).await.unwrap();

    let dms = ScriptedDms::accepting();
    let summary = push_pending(dms.clone(), &store, &cfg).await.unwrap();

    assert_eq!(summary.uploaded, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);
    assert_eq!(dms.uploads.lock().unwrap().len(), 2);
    for record in store.list().await.unwrap() {
        assert_eq!(record.dms_status, DmsStatus::Uploaded);
    }

    // One throttle pause between the two uploads, none after the last.
    let pauses = sleeper.pauses.lock().unwrap();
    assert_eq!(*pauses, vec![Duration::from_millis(3000)]);
}

#[tokio::test]
async fn second_push_skips_everything_already_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_bundle(dir.path(), &["a1", "b1"]);
    let out = dir.path().join("uploads");

    let ai = ScriptedAi::new(vec![
        Ok(r#"[{"start": 1, "end": 1}, {"start": 2, "end": 2}]"#.into()),
        Ok(INVOICE_A.into()),
        Ok(INVOICE_B.into()),
    ]);
    let store = MemoryStore::new();
    let cfg = with_dms(config(&out, Arc::new(RecordingSleeper::default())));

    process_batch(&input, &ai, &store, &cfg).await.unwrap();

    let dms = ScriptedDms::accepting();
    push_pending(dms.clone(), &store, &cfg).await.unwrap();
    let summary = push_pending(dms.clone(), &store, &cfg).await.unwrap();

    assert_eq!(summary.uploaded, 0);
    assert_eq!(summary.skipped, 2);
    // No new upload attempts happened on the second push.
    assert_eq!(dms.uploads.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn expired_token_costs_one_reauthentication_not_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_bundle(dir.path(), &["a1"]);
    let out = dir.path().join("uploads");

    let ai = ScriptedAi::new(vec![
        Ok(r#"[{"start": 1, "end": 1}]"#.into()),
        Ok(INVOICE_A.into()),
    ]);
    let store = MemoryStore::new();
    let cfg = with_dms(config(&out, Arc::new(RecordingSleeper::default())));

    process_batch(&input, &ai, &store, &cfg).await.unwrap();

    let dms = Arc::new(ScriptedDms {
        auths: Mutex::new(0),
        uploads: Mutex::new(Vec::new()),
        reject_first: 1,
    });
    let summary = push_pending(dms.clone(), &store, &cfg).await.unwrap();

    assert_eq!(summary.uploaded, 1);
    assert_eq!(*dms.auths.lock().unwrap(), 2);
    assert_eq!(
        store.list().await.unwrap()[0].dms_status,
        DmsStatus::Uploaded
    );
}

#[tokio::test]
async fn push_without_dms_settings_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let cfg = config(
        &dir.path().join("uploads"),
        Arc::new(RecordingSleeper::default()),
    );

    let err = push_pending(ScriptedDms::accepting(), &store, &cfg).await;
    assert!(matches!(err, Err(PipelineError::InvalidConfig(_))));
}
