use serde::Deserialize;

/// Object-store notification payload, as delivered for object-creation
/// events. Only the bucket name and object key are read; the rest of the
/// envelope is ignored.
#[derive(Debug, Deserialize)]
pub struct ObjectCreatedNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}
