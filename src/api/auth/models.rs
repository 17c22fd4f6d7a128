use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// 令牌在真正过期前 10 分钟即视为不可用，给长耗时请求留出余量。
pub const TOKEN_SAFETY_MARGIN_MINUTES: i64 = 10;

/// 应用级长期凭证（clientID / clientSecret）。
#[flutter_rust_bridge::frb]
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
}

impl Credential {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.client_id.trim().is_empty() || self.client_secret.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// 短期访问令牌。字段名与 token.json 以及令牌接口的 `data` 对象保持一致。
/// 续期时整体替换，从不就地修改。
#[flutter_rust_bridge::frb]
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    #[serde(rename = "accessToken")]
    pub value: String,
    #[serde(rename = "expiredAt", deserialize_with = "deserialize_expiry")]
    pub expires_at: DateTime<FixedOffset>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<FixedOffset>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// `now < expires_at - 10min` 时才可用。
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        let deadline =
            self.expires_at.with_timezone(&Utc) - Duration::minutes(TOKEN_SAFETY_MARGIN_MINUTES);
        now < deadline
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at.with_timezone(&Utc) - now
    }

    /// 形如 `1h 59m 3s` 的剩余有效期描述，已过期时为 `expired`。
    pub fn remaining_label(&self, now: DateTime<Utc>) -> String {
        let total = self.remaining(now).num_seconds();
        if total <= 0 {
            return "expired".to_string();
        }
        format!("{}h {}m {}s", total / 3600, (total % 3600) / 60, total % 60)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn deserialize_expiry<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_expiry(&raw).map_err(serde::de::Error::custom)
}

/// 解析过期时间：优先 RFC 3339（带时区偏移）；没有偏移的时间按本地时区解释。
pub fn parse_expiry(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed);
    }
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
        .map_err(|e| format!("invalid expiry timestamp {trimmed:?}: {e}"))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.fixed_offset())
        .ok_or_else(|| format!("expiry timestamp {trimmed:?} does not exist in local time"))
}
