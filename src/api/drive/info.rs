use super::models::UserInfo;
use crate::api::auth::AccessToken;
use crate::api::client::ApiClient;
use crate::error::PanResult;
use serde::Deserialize;

const USER_INFO_PATH: &str = "/api/v1/user/info";

/// 获取当前账号的空间与直链流量概览。
pub fn get_user_info(api: &ApiClient, token: &AccessToken) -> PanResult<UserInfo> {
    let payload: UserInfoDto = api.get(USER_INFO_PATH, &[], token)?;
    Ok(UserInfo::from(payload))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoDto {
    uid: Option<u64>,
    nickname: Option<String>,
    #[serde(default)]
    space_used: u64,
    #[serde(default)]
    space_permanent: u64,
    #[serde(default)]
    direct_traffic: u64,
}

impl From<UserInfoDto> for UserInfo {
    fn from(value: UserInfoDto) -> Self {
        UserInfo {
            uid: value.uid,
            nickname: value.nickname,
            space_used_bytes: value.space_used,
            space_permanent_bytes: value.space_permanent,
            direct_traffic_bytes: value.direct_traffic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ClientConfig;
    use chrono::{Duration, Utc};
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn reads_quota_figures() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(USER_INFO_PATH)
                .header("Authorization", "Bearer tok");
            then.status(200).json_body(json!({
                "code": 0,
                "data": {
                    "uid": 1814435971,
                    "nickname": "pan-user",
                    "spaceUsed": 5_368_709_120u64,
                    "spacePermanent": 2_199_023_255_552u64,
                    "directTraffic": 0
                }
            }));
        });
        let api = ApiClient::new(&ClientConfig::with_endpoints(
            server.base_url(),
            std::env::temp_dir(),
        ))
        .unwrap();
        let token = AccessToken::new("tok", (Utc::now() + Duration::hours(1)).fixed_offset());

        let info = get_user_info(&api, &token).unwrap();
        mock.assert();
        assert_eq!(info.uid, Some(1814435971));
        assert_eq!(info.nickname.as_deref(), Some("pan-user"));
        assert_eq!(info.space_used_bytes, 5_368_709_120);
        assert_eq!(info.space_permanent_bytes, 2_199_023_255_552);
    }
}
