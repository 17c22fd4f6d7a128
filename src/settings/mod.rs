pub mod download_directory;

pub use download_directory::default_download_directory;

use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "Panlink";
const APPLICATION: &str = "Panlink";

pub const DEFAULT_API_BASE: &str = "https://open-api.123pan.com";
/// 列表接口的固定分页大小，由服务端契约决定。
pub const PAGE_SIZE: u32 = 100;

/// 客户端运行参数。字段全部公开，调用方可以在 `Default` 基础上按需覆盖。
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_base: String,
    /// token.json 与 credentials.txt 所在目录。
    pub data_dir: PathBuf,
    /// 普通 JSON 接口的超时。
    pub request_timeout: Duration,
    /// 分片 PUT 与文件下载的超时。
    pub transfer_timeout: Duration,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub download_chunk_size: usize,
    pub hash_block_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            data_dir: default_data_dir(),
            request_timeout: Duration::from_secs(30),
            transfer_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 30,
            download_chunk_size: 8 * 1024,
            hash_block_size: 8 * 1024,
        }
    }
}

impl ClientConfig {
    /// 指向自定义 API 主机与数据目录，其余参数取默认值。
    pub fn with_endpoints(api_base: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_base: api_base.into(),
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }
}

fn default_data_dir() -> PathBuf {
    match ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION) {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => {
            tracing::warn!("failed to resolve application data directory; using working directory");
            PathBuf::from(".")
        }
    }
}
