pub mod api;
pub mod download_manager;
pub mod error;
pub mod progress;
pub mod settings;
mod slot;
pub mod store;
pub mod upload_manager;

pub use api::pan::PanClient;
pub use error::{AuthError, PanError, PanResult};
pub use progress::{
    EventHub, ProgressReporter, TransferEvent, TransferEventKind, TransferHandle, TransferKind,
    TransferOutcome, TransferProgress,
};
pub use settings::ClientConfig;
