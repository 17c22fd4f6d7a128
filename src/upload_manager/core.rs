use super::engine::{UploadEngine, UploadRequest};
use crate::api::auth::TokenSource;
use crate::api::drive::FileId;
use crate::error::{PanError, PanResult};
use crate::progress::{EventHub, TransferHandle, TransferKind};
use crate::slot::ActiveSlot;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

/// 在后台线程运行上传。同一时间只允许一个上传；不排队，忙碌时直接拒绝。
#[derive(Clone)]
pub struct UploadManager {
    engine: UploadEngine,
    tokens: Arc<dyn TokenSource>,
    hub: EventHub,
    slot: ActiveSlot,
}

impl UploadManager {
    pub fn new(engine: UploadEngine, tokens: Arc<dyn TokenSource>, hub: EventHub) -> Self {
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

    /// 立即返回；进度与终态通过 [`EventHub`] 广播。
    pub fn start_upload(
        &self,
        local_path: impl Into<PathBuf>,
        parent_folder_id: FileId,
    ) -> PanResult<TransferHandle> {
        let permit = self
            .slot
            .try_acquire()
            .ok_or(PanError::Busy(TransferKind::Upload))?;
        let request = UploadRequest {
            local_path: local_path.into(),
            parent_folder_id,
        };
        let transfer_id = Uuid::new_v4().to_string();
        let reporter = self.hub.reporter(transfer_id.clone(), TransferKind::Upload);
        let engine = self.engine.clone();
        let tokens = self.tokens.clone();
        tracing::info!(
            %transfer_id,
            path = %request.local_path.display(),
            parent_folder_id,
            "upload queued"
        );

        let join = thread::Builder::new()
            .name(format!("upload-{transfer_id}"))
            .spawn(move || {
                let _permit = permit;
                engine.run(tokens.as_ref(), &request, &reporter)
            })
            .map_err(PanError::Io)?;
        Ok(TransferHandle::new(transfer_id, TransferKind::Upload, join))
    }
}
