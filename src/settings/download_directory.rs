use directories::UserDirs;
use std::path::PathBuf;

const DOWNLOAD_SUBDIR: &str = "panlink";

/// 默认下载目录：系统「下载」文件夹下的 panlink 子目录，缺失时回退到 home。
pub fn default_download_directory() -> Option<PathBuf> {
    let user_dirs = UserDirs::new()?;
    let base = user_dirs.download_dir().unwrap_or(user_dirs.home_dir());
    Some(base.join(DOWNLOAD_SUBDIR))
}
