use super::models::{AccessToken, Credential};
use crate::api::client::ApiClient;
use crate::error::{AuthError, PanError, PanResult};
use chrono::Utc;
use serde::Serialize;

const TOKEN_PATH: &str = "/api/v1/access_token";

#[derive(Serialize)]
struct TokenRequest<'a> {
    #[serde(rename = "clientID")]
    client_id: &'a str,
    #[serde(rename = "clientSecret")]
    client_secret: &'a str,
}

/// 用应用凭证换取短期访问令牌。失败直接上抛，不做重试。
#[derive(Clone, Debug)]
pub struct AuthClient {
    api: ApiClient,
}

impl AuthClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn acquire_token(&self, credential: &Credential) -> PanResult<AccessToken> {
        if credential.is_blank() {
            return Err(AuthError::InvalidCredentials(
                "client id and client secret are required".to_string(),
            )
            .into());
        }
        let request = TokenRequest {
            client_id: credential.client_id.trim(),
            client_secret: credential.client_secret.trim(),
        };
        tracing::debug!(client_id = %request.client_id, "exchanging credentials for access token");
        let token: AccessToken = self
            .api
            .post(TOKEN_PATH, &request, None)
            .map_err(map_exchange_error)?;
        tracing::info!(expires_at = %token.expires_at, "access token acquired");
        Ok(token)
    }

    /// 应用 10 分钟安全余量的有效性检查。
    pub fn is_valid(token: &AccessToken) -> bool {
        token.is_usable_at(Utc::now())
    }
}

fn map_exchange_error(err: PanError) -> PanError {
    match err {
        PanError::Remote { message, .. } => AuthError::InvalidCredentials(message).into(),
        PanError::Network(message) => AuthError::Network(message).into(),
        other => other,
    }
}
