use std::sync::Arc;

use crate::db::MetadataStore;
use crate::services::auth::IdentityVerifier;
use crate::services::queue::WorkQueue;
use crate::services::storage::ObjectStoreWrite;

/// Shared application state passed to all route handlers.
///
/// Collaborators are injected as trait handles, constructed once at startup.
/// The API holds delete-capable handles on both buckets but never reads
/// object bytes; reading originals belongs to the worker alone.
#[derive(Clone)]
pub struct AppState {
    pub metadata: Arc<dyn MetadataStore>,
    pub images: Arc<dyn ObjectStoreWrite>,
    pub thumbnails: Arc<dyn ObjectStoreWrite>,
    pub queue: Arc<dyn WorkQueue>,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        images: Arc<dyn ObjectStoreWrite>,
        thumbnails: Arc<dyn ObjectStoreWrite>,
        queue: Arc<dyn WorkQueue>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            metadata,
            images,
            thumbnails,
            queue,
            verifier,
        }
    }
}
