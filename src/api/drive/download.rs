use super::models::FileId;
use crate::api::auth::AccessToken;
use crate::api::client::ApiClient;
use crate::error::{PanError, PanResult};
use serde::Deserialize;

const DOWNLOAD_INFO_PATH: &str = "/api/v1/file/download_info";

/// 获取文件的限时签名下载地址；该地址无需再携带鉴权头。
pub fn get_download_url(
    api: &ApiClient,
    token: &AccessToken,
    file_id: FileId,
) -> PanResult<String> {
    let payload: DownloadInfoDto =
        api.get(DOWNLOAD_INFO_PATH, &[("fileId", file_id.to_string())], token)?;
    payload
        .download_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| PanError::Protocol(format!("no download url returned for file {file_id}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadInfoDto {
    download_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ClientConfig;
    use chrono::{Duration, Utc};
    use httpmock::prelude::*;
    use serde_json::json;

    fn fixtures(server: &MockServer) -> (ApiClient, AccessToken) {
        let api = ApiClient::new(&ClientConfig::with_endpoints(
            server.base_url(),
            std::env::temp_dir(),
        ))
        .unwrap();
        let token = AccessToken::new("tok", (Utc::now() + Duration::hours(1)).fixed_offset());
        (api, token)
    }

    #[test]
    fn returns_signed_url() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(DOWNLOAD_INFO_PATH)
                .query_param("fileId", "99");
            then.status(200).json_body(json!({
                "code": 0,
                "data": {"downloadUrl": "https://cdn.example.com/f/99?sig=abc"}
            }));
        });
        let (api, token) = fixtures(&server);
        let url = get_download_url(&api, &token, 99).unwrap();
        mock.assert();
        assert_eq!(url, "https://cdn.example.com/f/99?sig=abc");
    }

    #[test]
    fn missing_url_is_protocol_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(DOWNLOAD_INFO_PATH);
            then.status(200).json_body(json!({"code": 0, "data": {}}));
        });
        let (api, token) = fixtures(&server);
        let err = get_download_url(&api, &token, 1).unwrap_err();
        assert!(matches!(err, PanError::Protocol(_)));
    }
}
