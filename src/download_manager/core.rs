use super::engine::DownloadEngine;
use crate::api::auth::TokenSource;
use crate::api::drive::FileId;
use crate::error::{PanError, PanResult};
use crate::progress::{EventHub, TransferHandle, TransferKind};
use crate::slot::ActiveSlot;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

/// 与上传对称：单个后台下载，忙碌时拒绝新的请求。
#[derive(Clone)]
pub struct DownloadManager {
    engine: DownloadEngine,
    tokens: Arc<dyn TokenSource>,
    hub: EventHub,
    slot: ActiveSlot,
}

impl DownloadManager {
    pub fn new(engine: DownloadEngine, tokens: Arc<dyn TokenSource>, hub: EventHub) -> Self {
        Self {
            engine,
            tokens,
            hub,
            slot: ActiveSlot::default(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    pub fn start_download(
        &self,
        file_id: FileId,
        destination: impl Into<PathBuf>,
    ) -> PanResult<TransferHandle> {
        let permit = self
            .slot
            .try_acquire()
            .ok_or(PanError::Busy(TransferKind::Download))?;
        let destination = destination.into();
        let transfer_id = Uuid::new_v4().to_string();
        let reporter = self
            .hub
            .reporter(transfer_id.clone(), TransferKind::Download);
        let engine = self.engine.clone();
        let tokens = self.tokens.clone();
        tracing::info!(
            %transfer_id,
            file_id,
            destination = %destination.display(),
            "download queued"
        );

        let join = thread::Builder::new()
            .name(format!("download-{transfer_id}"))
            .spawn(move || {
                let _permit = permit;
                engine.run(tokens.as_ref(), file_id, &destination, &reporter)
            })
            .map_err(PanError::Io)?;
        Ok(TransferHandle::new(transfer_id, TransferKind::Download, join))
    }
}
