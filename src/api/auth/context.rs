use super::auth::AuthClient;
use super::models::{AccessToken, Credential};
use crate::error::{AuthError, PanResult};
use crate::store::TokenStore;
use chrono::{DateTime, Utc};
use std::sync::{PoisonError, RwLock};

/// 每次发起接口调用前取一次令牌。实现方负责保证返回的令牌仍在安全余量之内。
pub trait TokenSource: Send + Sync {
    fn token(&self) -> PanResult<AccessToken>;
}

/// 固定令牌：调用方已自行保证有效期。
impl TokenSource for AccessToken {
    fn token(&self) -> PanResult<AccessToken> {
        Ok(self.clone())
    }
}

/// 显式传递的鉴权上下文：持有当前令牌，并在使用前同步地完成续期。
/// 只有续期路径会写入（单写者），其余调用只读。
#[derive(Debug)]
pub struct AuthContext {
    auth: AuthClient,
    store: TokenStore,
    current: RwLock<Option<AccessToken>>,
}

impl AuthContext {
    pub fn new(auth: AuthClient, store: TokenStore) -> Self {
        Self {
            auth,
            store,
            current: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn is_signed_in(&self) -> bool {
        self.cached()
            .map(|token| token.is_usable_at(Utc::now()))
            .unwrap_or(false)
    }

    /// 返回一个可用的令牌；必要时依次尝试 token.json 与凭证文件。
    pub fn current_token(&self) -> PanResult<AccessToken> {
        self.current_token_at(Utc::now())
    }

    pub(crate) fn current_token_at(&self, now: DateTime<Utc>) -> PanResult<AccessToken> {
        if let Some(token) = self.cached().filter(|t| t.is_usable_at(now)) {
            return Ok(token);
        }

        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        // 拿到写锁期间可能已被其他线程续期。
        if let Some(token) = slot.as_ref().filter(|t| t.is_usable_at(now)) {
            return Ok(token.clone());
        }

        if let Some(token) = self.store.load_token()?.filter(|t| t.is_usable_at(now)) {
            tracing::debug!(expires_at = %token.expires_at, "using cached token file");
            *slot = Some(token.clone());
            return Ok(token);
        }

        let credential = self.store.load_credentials()?.ok_or(AuthError::NotSignedIn)?;
        tracing::info!("cached token missing or near expiry; renewing");
        let token = self.auth.acquire_token(&credential)?;
        self.store.save_token(&token)?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// 交互式登录：换取成功后依次写入凭证与 token.json，两者都落盘后才进入已登录状态。
    /// 任一写入失败则整体失败，并撤销已写入的凭证。
    pub fn login(&self, credential: Credential) -> PanResult<AccessToken> {
        let token = self.auth.acquire_token(&credential)?;
        self.store.save_credentials(&credential)?;
        if let Err(err) = self.store.save_token(&token) {
            if let Err(cleanup) = self.store.clear_credentials() {
                tracing::warn!("failed to roll back saved credentials: {cleanup}");
            }
            return Err(err);
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(token)
    }

    /// 清空内存令牌并删除 token.json 与凭证文件。
    pub fn logout(&self) -> PanResult<()> {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.store.clear_token()?;
        self.store.clear_credentials()?;
        tracing::info!("signed out; local credentials removed");
        Ok(())
    }

    fn cached(&self) -> Option<AccessToken> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TokenSource for AuthContext {
    fn token(&self) -> PanResult<AccessToken> {
        self.current_token()
    }
}
