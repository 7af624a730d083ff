pub mod auth;
pub mod detection;
pub mod labeler;
pub mod queue;
pub mod storage;
pub mod thumbnail;
