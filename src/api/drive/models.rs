/// 网盘侧的文件 ID；根目录为 0。
pub type FileId = u64;

pub const ROOT_FOLDER_ID: FileId = 0;

#[flutter_rust_bridge::frb]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileCategory {
    Unknown,
    Audio,
    Video,
    Image,
}

impl FileCategory {
    pub(crate) fn from_code(code: i64) -> Self {
        match code {
            1 => FileCategory::Audio,
            2 => FileCategory::Video,
            3 => FileCategory::Image,
            _ => FileCategory::Unknown,
        }
    }
}

/// 审核状态：服务端 status <= 100 为正常，其余为驳回。
#[flutter_rust_bridge::frb]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileStatus {
    Normal,
    Rejected,
}

impl FileStatus {
    pub(crate) fn from_code(code: i64) -> Self {
        if code <= 100 {
            FileStatus::Normal
        } else {
            FileStatus::Rejected
        }
    }
}

/// 列表接口返回的单个条目快照，只读。
#[flutter_rust_bridge::frb]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub id: FileId,
    pub name: String,
    pub is_folder: bool,
    pub size_bytes: u64,
    /// 服务端记录的 MD5（etag）。
    pub content_hash: String,
    pub category: FileCategory,
    pub status: FileStatus,
    pub parent_id: FileId,
    pub trashed: bool,
}

/// 一页列表结果；`next_cursor` 为空表示已经到底。
#[flutter_rust_bridge::frb]
#[derive(Clone, Debug, Default)]
pub struct FilePage {
    pub entries: Vec<FileEntry>,
    pub next_cursor: Option<FileId>,
}

#[flutter_rust_bridge::frb]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub uid: Option<u64>,
    pub nickname: Option<String>,
    pub space_used_bytes: u64,
    pub space_permanent_bytes: u64,
    pub direct_traffic_bytes: u64,
}

/// 创建上传任务的结果。`reused = true` 表示秒传命中，无需再传任何字节。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadCreateResult {
    pub reused: bool,
    pub file_id: Option<FileId>,
    pub preupload_id: Option<String>,
    pub slice_size_bytes: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadCompleteResult {
    pub completed: bool,
    /// 服务端还需异步处理，调用方需要轮询。
    pub is_async: bool,
    pub file_id: Option<FileId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadPollResult {
    pub completed: bool,
    pub file_id: Option<FileId>,
}

/// 下载完成后的结果描述，便于前端提示保存路径与大小。
#[flutter_rust_bridge::frb]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadResult {
    pub saved_path: String,
    pub bytes_downloaded: u64,
    pub expected_size: Option<u64>,
}

/// 把 1024 进制的字节数格式化为带单位的字符串，供列表展示。
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match size {
        s if s < KB => format!("{s} B"),
        s if s < MB => format!("{:.2} KB", s as f64 / KB as f64),
        s if s < GB => format!("{:.2} MB", s as f64 / MB as f64),
        s => format!("{:.2} GB", s as f64 / GB as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sizes_with_binary_units() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(1023), "1023 B");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn maps_status_and_category_codes() {
        assert_eq!(FileStatus::from_code(0), FileStatus::Normal);
        assert_eq!(FileStatus::from_code(100), FileStatus::Normal);
        assert_eq!(FileStatus::from_code(101), FileStatus::Rejected);
        assert_eq!(FileCategory::from_code(2), FileCategory::Video);
        assert_eq!(FileCategory::from_code(42), FileCategory::Unknown);
    }
}
