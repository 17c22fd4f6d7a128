//! 统一错误类型：所有对外操作都返回 `Result<T, PanError>`。

use crate::progress::TransferKind;

/// 令牌交换与登录状态相关的错误。
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// 服务端返回非零 code，通常是 clientID / clientSecret 错误。
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("network error during token exchange: {0}")]
    Network(String),

    /// 既没有可用的缓存令牌，也没有保存的凭证。
    #[error("not signed in; please log in with client credentials")]
    NotSignedIn,
}

#[derive(Debug, thiserror::Error)]
pub enum PanError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// 任意 `code != 0` 的接口响应。
    #[error("remote error {code}: {message}")]
    Remote { code: i64, message: String },

    /// 响应成功但缺少协议要求的字段，或响应体无法解析。
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("slice {slice_no}/{total_slices} failed with HTTP {status}")]
    SliceRejected {
        slice_no: u32,
        total_slices: u32,
        status: u16,
    },

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("{0} already in progress")]
    Busy(TransferKind),
}

impl From<reqwest::Error> for PanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PanError::Protocol(format!("failed to decode response: {err}"))
        } else {
            PanError::Network(err.to_string())
        }
    }
}

pub type PanResult<T> = Result<T, PanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_failure_message_keeps_partial_progress() {
        let err = PanError::SliceRejected {
            slice_no: 4,
            total_slices: 10,
            status: 500,
        };
        assert_eq!(err.to_string(), "slice 4/10 failed with HTTP 500");
    }

    #[test]
    fn auth_errors_are_transparent() {
        let err: PanError = AuthError::InvalidCredentials("bad secret".into()).into();
        assert_eq!(err.to_string(), "invalid credentials: bad secret");
    }

    #[test]
    fn busy_names_the_transfer_kind() {
        assert_eq!(
            PanError::Busy(TransferKind::Upload).to_string(),
            "upload already in progress"
        );
    }
}
