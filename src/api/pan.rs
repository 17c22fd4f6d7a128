//! 面向界面层的入口。界面只通过这里发起登录、列目录与传输，
//! 传输结果统一经由 [`PanClient::subscribe_events`] 返回。

use crate::api::auth::{AccessToken, AuthClient, AuthContext, Credential, TokenSource};
use crate::api::client::ApiClient;
use crate::api::drive::{self, FileEntry, FileId, FilePage, UserInfo, ROOT_FOLDER_ID};
use crate::download_manager::{DownloadEngine, DownloadManager};
use crate::error::{AuthError, PanError, PanResult};
use crate::progress::{EventHub, TransferEvent, TransferHandle};
use crate::settings::{default_download_directory, ClientConfig};
use crate::store::TokenStore;
use crate::upload_manager::{UploadEngine, UploadManager};
use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::Arc;

#[flutter_rust_bridge::frb(opaque)]
pub struct PanClient {
    config: ClientConfig,
    api: ApiClient,
    auth: Arc<AuthContext>,
    hub: EventHub,
    uploads: UploadManager,
    downloads: DownloadManager,
}

impl PanClient {
    pub fn new(config: ClientConfig) -> PanResult<Self> {
        let api = ApiClient::new(&config)?;
        let auth = Arc::new(AuthContext::new(
            AuthClient::new(api.clone()),
            TokenStore::new(&config.data_dir),
        ));
        let tokens: Arc<dyn TokenSource> = auth.clone();
        let hub = EventHub::new();
        let uploads = UploadManager::new(
            UploadEngine::new(api.clone(), &config),
            tokens.clone(),
            hub.clone(),
        );
        let downloads =
            DownloadManager::new(DownloadEngine::new(api.clone(), &config), tokens, hub.clone());
        tracing::debug!(
            api_base = %api.base_url(),
            data_dir = %config.data_dir.display(),
            "client ready"
        );

        Ok(Self {
            config,
            api,
            auth,
            hub,
            uploads,
            downloads,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// 用 clientID / clientSecret 换取令牌并持久化两者。
    pub fn login(&self, client_id: String, client_secret: String) -> PanResult<AccessToken> {
        let token = self.auth.login(Credential::new(client_id, client_secret))?;
        tracing::info!(remaining = %token.remaining_label(Utc::now()), "signed in");
        Ok(token)
    }

    pub fn logout(&self) -> PanResult<()> {
        self.auth.logout()
    }

    /// 启动时调用：有可用的缓存令牌或已保存的凭证即视为已登录。
    pub fn restore_session(&self) -> PanResult<bool> {
        match self.auth.current_token() {
            Ok(_) => Ok(true),
            Err(PanError::Auth(AuthError::NotSignedIn)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.auth.is_signed_in()
    }

    pub fn current_token(&self) -> PanResult<AccessToken> {
        self.auth.current_token()
    }

    pub fn user_info(&self) -> PanResult<UserInfo> {
        drive::get_user_info(&self.api, &self.auth.current_token()?)
    }

    pub fn list_files(&self, folder_id: FileId, after: Option<FileId>) -> PanResult<FilePage> {
        drive::list_files(&self.api, &self.auth.current_token()?, folder_id, after)
    }

    pub fn list_root_files(&self, after: Option<FileId>) -> PanResult<FilePage> {
        self.list_files(ROOT_FOLDER_ID, after)
    }

    /// 沿游标逐页拉取，直到服务端表示没有下一页。
    pub fn list_all_files(&self, folder_id: FileId) -> PanResult<Vec<FileEntry>> {
        let mut entries = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.list_files(folder_id, cursor)?;
            entries.extend(page.entries);
            match page.next_cursor {
                Some(next) if Some(next) != cursor => cursor = Some(next),
                _ => break,
            }
        }
        Ok(entries)
    }

    pub fn start_upload(
        &self,
        local_path: String,
        parent_folder_id: FileId,
    ) -> PanResult<TransferHandle> {
        self.uploads.start_upload(local_path, parent_folder_id)
    }

    pub fn start_download(
        &self,
        file_id: FileId,
        destination: String,
    ) -> PanResult<TransferHandle> {
        self.downloads.start_download(file_id, PathBuf::from(destination))
    }

    /// 保存到系统下载目录下的 panlink 子目录；只取 `file_name` 的最后一段，避免写出该目录。
    pub fn default_download_path(&self, file_name: &str) -> PanResult<PathBuf> {
        let name = Path::new(file_name)
            .file_name()
            .filter(|name| !name.to_string_lossy().trim().is_empty())
            .ok_or_else(|| {
                PanError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a file name: {file_name:?}"),
                ))
            })?;
        let dir = default_download_directory().ok_or_else(|| {
            PanError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no download directory for the current user",
            ))
        })?;
        Ok(dir.join(name))
    }

    pub fn start_download_to_default(
        &self,
        file_id: FileId,
        file_name: String,
    ) -> PanResult<TransferHandle> {
        let destination = self.default_download_path(&file_name)?;
        self.downloads.start_download(file_id, destination)
    }

    pub fn is_upload_active(&self) -> bool {
        self.uploads.is_busy()
    }

    pub fn is_download_active(&self) -> bool {
        self.downloads.is_busy()
    }

    pub fn subscribe_events(&self) -> Receiver<TransferEvent> {
        self.hub.subscribe()
    }
}
