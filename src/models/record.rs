use serde::{Deserialize, Serialize};

/// A single machine-generated label with its detection confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub confidence: f64,
}

/// Metadata record for one uploaded image.
///
/// Keyed by the object key of the original upload. Label order is preserved
/// as returned by the detection service. Written only by the label worker
/// (idempotent upsert, last writer wins), read and deleted by the query API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub image_key: String,
    pub labels: Vec<Label>,
    pub thumbnail_key: String,
}
