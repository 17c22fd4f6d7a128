mod download;
mod info;
mod list;
mod models;
mod upload;

pub use download::get_download_url;
pub use info::get_user_info;
pub use list::list_files;
pub use models::{
    format_file_size, DownloadResult, FileCategory, FileEntry, FileId, FilePage, FileStatus,
    UploadCompleteResult, UploadCreateResult, UploadPollResult, UserInfo, ROOT_FOLDER_ID,
};
pub use upload::{
    complete_upload, create_upload, get_slice_upload_url, poll_upload_result, put_slice,
};
