//! In-memory implementations of the injected collaborators, plus shared
//! fixtures for driving the worker pipeline and the API router without any
//! network dependencies.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use uuid::Uuid;

use image_labeler::app_state::AppState;
use image_labeler::db::{MetadataError, MetadataStore};
use image_labeler::models::job::{Delivery, Job};
use image_labeler::models::record::{ImageRecord, Label};
use image_labeler::services::auth::{AuthError, IdentityVerifier};
use image_labeler::services::detection::{DetectionError, DetectionService};
use image_labeler::services::queue::{QueueError, WorkQueue, MAX_DELIVERIES, VISIBILITY_TIMEOUT};
use image_labeler::services::storage::{ObjectStoreRead, ObjectStoreWrite, StorageError};

// ── Object store ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_puts: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, data: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), data);
    }

    pub fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    /// Make the next `n` puts fail with a transient storage error.
    pub fn fail_next_puts(&self, n: usize) {
        self.fail_puts.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStoreRead for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.get_bytes(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl ObjectStoreWrite for MemoryObjectStore {
    async fn put(&self, key: &str, data: &[u8], _content_type: &str) -> Result<(), StorageError> {
        if self
            .fail_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StorageError::Unavailable("simulated put failure".to_string()));
        }
        self.insert(key, data.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

// ── Metadata store ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryMetadataStore {
    records: Mutex<BTreeMap<String, ImageRecord>>,
    fail_upserts: AtomicUsize,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: &str) -> Option<ImageRecord> {
        self.records.lock().unwrap().get(key).cloned()
    }

    pub fn count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn seed(&self, record: ImageRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.image_key.clone(), record);
    }

    /// Make the next `n` upserts fail with a transient store error.
    pub fn fail_next_upserts(&self, n: usize) {
        self.fail_upserts.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn upsert(&self, record: &ImageRecord) -> Result<(), MetadataError> {
        if self
            .fail_upserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(MetadataError::Unavailable(
                "simulated upsert failure".to_string(),
            ));
        }
        self.seed(record.clone());
        Ok(())
    }

    async fn get(&self, image_key: &str) -> Result<Option<ImageRecord>, MetadataError> {
        Ok(self.record(image_key))
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<ImageRecord>, MetadataError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.image_key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn delete(&self, image_key: &str) -> Result<(), MetadataError> {
        self.records.lock().unwrap().remove(image_key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), MetadataError> {
        Ok(())
    }
}

// ── Work queue ───────────────────────────────────────────────────────

struct InFlight {
    receipt: String,
    job: Job,
    deadline: DateTime<Utc>,
}

#[derive(Default)]
struct QueueInner {
    pending: VecDeque<Job>,
    in_flight: Vec<InFlight>,
    dead: Vec<Job>,
    delivery_log: Vec<Job>,
}

/// In-memory [`WorkQueue`] with the production queue's semantics:
/// visibility timeout, redelivery, and dead-lettering once the delivery
/// budget is spent. `expire_in_flight` stands in for the passage of the
/// visibility window.
#[derive(Default)]
pub struct MemoryWorkQueue {
    inner: Mutex<QueueInner>,
}

impl MemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force every in-flight delivery's visibility deadline into the past.
    pub fn expire_in_flight(&self) {
        let mut inner = self.inner.lock().unwrap();
        let past = Utc::now() - ChronoDuration::seconds(1);
        for entry in &mut inner.in_flight {
            entry.deadline = past;
        }
    }

    /// Every delivery handed out so far, in order.
    pub fn delivery_log(&self) -> Vec<Job> {
        self.inner.lock().unwrap().delivery_log.clone()
    }

    pub fn in_flight_len(&self) -> usize {
        self.inner.lock().unwrap().in_flight.len()
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        self.inner.lock().unwrap().pending.push_back(job);
        Ok(())
    }

    async fn receive(&self, max: usize) -> Result<Vec<Delivery>, QueueError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();

        // Reap expired in-flight deliveries: redeliver while the budget
        // lasts, dead-letter after.
        let in_flight = std::mem::take(&mut inner.in_flight);
        for entry in in_flight {
            if entry.deadline > now {
                inner.in_flight.push(entry);
            } else if entry.job.delivery_attempt >= MAX_DELIVERIES {
                inner.dead.push(entry.job);
            } else {
                inner.pending.push_back(entry.job);
            }
        }

        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(mut job) = inner.pending.pop_front() else {
                break;
            };
            job.delivery_attempt += 1;

            let receipt = Uuid::new_v4().to_string();
            inner.in_flight.push(InFlight {
                receipt: receipt.clone(),
                job: job.clone(),
                deadline: now + ChronoDuration::from_std(VISIBILITY_TIMEOUT).unwrap(),
            });
            inner.delivery_log.push(job.clone());
            batch.push(Delivery { receipt, job });
        }

        Ok(batch)
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();
        inner.in_flight.retain(|e| e.receipt != delivery.receipt);
        Ok(())
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        Ok(self.inner.lock().unwrap().pending.len() as u64)
    }

    async fn dead_letters(&self) -> Result<Vec<Job>, QueueError> {
        Ok(self.inner.lock().unwrap().dead.clone())
    }

    async fn ping(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

// ── Detection ────────────────────────────────────────────────────────

/// Detection stub returning a fixed label set.
pub struct StaticDetection {
    labels: Vec<Label>,
    calls: AtomicUsize,
}

impl StaticDetection {
    pub fn new(labels: Vec<Label>) -> Self {
        Self {
            labels,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionService for StaticDetection {
    async fn detect_labels(&self, _image_bytes: &[u8]) -> Result<Vec<Label>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.labels.clone())
    }
}

/// Detection stub that fails every call, like a throttled or down service.
#[derive(Default)]
pub struct FailingDetection {
    calls: AtomicUsize,
}

impl FailingDetection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DetectionService for FailingDetection {
    async fn detect_labels(&self, _image_bytes: &[u8]) -> Result<Vec<Label>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DetectionError::Service(
            "simulated detection outage".to_string(),
        ))
    }
}

// ── Identity ─────────────────────────────────────────────────────────

/// Verifier with a fixed token → subject table.
pub struct StaticVerifier {
    subjects: HashMap<String, String>,
}

impl StaticVerifier {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            subjects: pairs
                .iter()
                .map(|(token, subject)| (token.to_string(), subject.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, bearer_token: &str) -> Result<String, AuthError> {
        self.subjects
            .get(bearer_token)
            .cloned()
            .ok_or(AuthError::Rejected)
    }
}

// ── Shared context ───────────────────────────────────────────────────

pub struct TestContext {
    pub state: AppState,
    pub queue: Arc<MemoryWorkQueue>,
    pub images: Arc<MemoryObjectStore>,
    pub thumbnails: Arc<MemoryObjectStore>,
    pub metadata: Arc<MemoryMetadataStore>,
}

/// Build an [`AppState`] over in-memory collaborators. Tokens `u1-token` and
/// `u2-token` map to subjects `u1` and `u2`.
pub fn test_context() -> TestContext {
    let queue = Arc::new(MemoryWorkQueue::new());
    let images = Arc::new(MemoryObjectStore::new());
    let thumbnails = Arc::new(MemoryObjectStore::new());
    let metadata = Arc::new(MemoryMetadataStore::new());
    let verifier = Arc::new(StaticVerifier::new(&[
        ("u1-token", "u1"),
        ("u2-token", "u2"),
    ]));

    let state = AppState::new(
        metadata.clone(),
        images.clone(),
        thumbnails.clone(),
        queue.clone(),
        verifier,
    );

    TestContext {
        state,
        queue,
        images,
        thumbnails,
        metadata,
    }
}

/// A small but real PNG payload.
pub fn image_fixture() -> Vec<u8> {
    let img = image::RgbImage::from_fn(320, 240, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn cat_label() -> Vec<Label> {
    vec![Label {
        name: "cat".to_string(),
        confidence: 0.97,
    }]
}
