use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A unit of labeling work referencing one uploaded image.
///
/// Jobs live only inside the work queue; nothing persists them elsewhere.
/// `delivery_attempt` is 0 until the queue first hands the job to a consumer
/// and increments on every delivery after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub source_key: String,
    pub enqueued_at: DateTime<Utc>,
    pub delivery_attempt: u32,
}

impl Job {
    pub fn new(source_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            enqueued_at: Utc::now(),
            delivery_attempt: 0,
        }
    }
}

/// An in-flight delivery of a job.
///
/// The receipt identifies this delivery to the queue; acknowledging it
/// removes the job permanently. An unacknowledged delivery becomes
/// receivable again once its visibility timeout lapses.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub receipt: String,
    pub job: Job,
}
