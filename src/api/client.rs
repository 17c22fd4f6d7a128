use crate::api::auth::AccessToken;
use crate::error::{PanError, PanResult};
use crate::settings::ClientConfig;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PLATFORM_HEADER: &str = "Platform";
const PLATFORM_VALUE: &str = "open_platform";

/// 构建一个带有统一超时与重定向策略的阻塞式 HTTP 客户端。
pub(crate) fn build_blocking_client(timeout: Duration) -> PanResult<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(Policy::limited(10))
        .build()
        .map_err(|e| PanError::Network(format!("failed to build HTTP client: {e}")))
}

/// 所有接口共用的响应外壳：`code != 0` 即失败。
#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// 开放平台 JSON 接口的无状态封装。
/// `transfer` 客户端超时更长，专供分片 PUT 与文件下载这类不带鉴权头的签名地址使用。
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    transfer: Client,
    base: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> PanResult<Self> {
        Ok(Self {
            http: build_blocking_client(config.request_timeout)?,
            transfer: build_blocking_client(config.transfer_timeout)?,
            base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub(crate) fn transfer_http(&self) -> &Client {
        &self.transfer
    }

    // 按开放平台文档发送 `Authorization: Bearer <token>`，不是部分旧客户端使用的裸令牌。
    pub(crate) fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: &AccessToken,
    ) -> PanResult<T> {
        let request = self
            .http
            .get(self.endpoint(path))
            .query(query)
            .bearer_auth(&token.value);
        send_and_decode(request)
    }

    pub(crate) fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: Option<&AccessToken>,
    ) -> PanResult<T> {
        let mut request = self.http.post(self.endpoint(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(&token.value);
        }
        send_and_decode(request)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

fn send_and_decode<T: DeserializeOwned>(request: RequestBuilder) -> PanResult<T> {
    let response = request
        .header(PLATFORM_HEADER, PLATFORM_VALUE)
        .header("Accept", "application/json")
        .send()?;
    let status = response.status();
    let body = response.text()?;
    decode_envelope(status, &body)
}

/// 拆开响应外壳。即使 HTTP 状态码非 2xx，只要响应体是合法外壳也优先使用其中的 code/message。
pub(crate) fn decode_envelope<T: DeserializeOwned>(
    status: reqwest::StatusCode,
    body: &str,
) -> PanResult<T> {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(PanError::Network(format!("api returned HTTP {status}")));
        }
        Err(err) => {
            return Err(PanError::Protocol(format!(
                "malformed response envelope: {err}"
            )));
        }
    };

    if envelope.code != 0 {
        return Err(PanError::Remote {
            code: envelope.code,
            message: envelope
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    }

    let data = envelope
        .data
        .ok_or_else(|| PanError::Protocol("response is missing the data object".to_string()))?;
    serde_json::from_value(data)
        .map_err(|e| PanError::Protocol(format!("unexpected response data: {e}")))
}
