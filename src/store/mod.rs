//! 本地凭据持久化：令牌缓存（token.json）与应用凭证（credentials.txt）。
//! 两个文件都是整文件覆盖写入，读取缺失视为「没有记录」。

use crate::api::auth::{AccessToken, Credential};
use crate::error::PanResult;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const TOKEN_FILE_NAME: &str = "token.json";
const CREDENTIALS_FILE_NAME: &str = "credentials.txt";

#[derive(Clone, Debug)]
pub struct TokenStore {
    token_path: PathBuf,
    credentials_path: PathBuf,
}

impl TokenStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref();
        Self {
            token_path: dir.join(TOKEN_FILE_NAME),
            credentials_path: dir.join(CREDENTIALS_FILE_NAME),
        }
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// 读取缓存令牌。文件损坏时记录警告并返回 `None`，交由上层重新换取。
    pub fn load_token(&self) -> PanResult<Option<AccessToken>> {
        let Some(raw) = read_optional(&self.token_path)? else {
            return Ok(None);
        };
        match serde_json::from_str::<AccessToken>(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(err) => {
                tracing::warn!(path = %self.token_path.display(), "ignoring unreadable token file: {err}");
                Ok(None)
            }
        }
    }

    pub fn save_token(&self, token: &AccessToken) -> PanResult<()> {
        let payload = serde_json::to_vec(token).map_err(io::Error::other)?;
        write_whole(&self.token_path, &payload)
    }

    pub fn clear_token(&self) -> PanResult<()> {
        remove_if_exists(&self.token_path)
    }

    /// 凭证文件格式：第一行 clientID，第二行 clientSecret。不足两行视为没有凭证。
    pub fn load_credentials(&self) -> PanResult<Option<Credential>> {
        let Some(raw) = read_optional(&self.credentials_path)? else {
            return Ok(None);
        };
        let mut lines = raw.lines().map(str::trim);
        let credential = match (lines.next(), lines.next()) {
            (Some(id), Some(secret)) => Credential::new(id, secret),
            _ => return Ok(None),
        };
        if credential.is_blank() {
            return Ok(None);
        }
        Ok(Some(credential))
    }

    pub fn save_credentials(&self, credential: &Credential) -> PanResult<()> {
        let payload = format!("{}\n{}", credential.client_id, credential.client_secret);
        write_whole(&self.credentials_path, payload.as_bytes())
    }

    pub fn clear_credentials(&self) -> PanResult<()> {
        remove_if_exists(&self.credentials_path)
    }
}

fn read_optional(path: &Path) -> PanResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn write_whole(path: &Path, payload: &[u8]) -> PanResult<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, payload)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> PanResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
