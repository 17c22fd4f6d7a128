pub mod core;
pub mod engine;

pub use core::UploadManager;
pub use engine::{
    compute_content_hash, plan_slices, SliceRange, UploadDone, UploadEngine, UploadRequest,
    UploadSession,
};
