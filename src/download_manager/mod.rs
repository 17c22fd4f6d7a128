pub mod core;
pub mod engine;

pub use core::DownloadManager;
pub use engine::DownloadEngine;
