//! 分片上传协议的四个接口，以及向签名地址 PUT 分片数据。
//! 这里只做请求/响应映射，状态机在 `upload_manager` 中。

use super::models::{FileId, UploadCompleteResult, UploadCreateResult, UploadPollResult};
use crate::api::auth::AccessToken;
use crate::api::client::ApiClient;
use crate::error::{PanError, PanResult};
use serde::{Deserialize, Serialize};

const CREATE_PATH: &str = "/upload/v1/file/create";
const SLICE_URL_PATH: &str = "/upload/v1/file/get_upload_url";
const COMPLETE_PATH: &str = "/upload/v1/file/upload_complete";
const ASYNC_RESULT_PATH: &str = "/upload/v1/file/upload_async_result";

#[derive(Serialize)]
struct CreateRequest<'a> {
    #[serde(rename = "parentFileID")]
    parent_file_id: FileId,
    filename: &'a str,
    etag: &'a str,
    size: u64,
}

#[derive(Serialize)]
struct SliceUrlRequest<'a> {
    #[serde(rename = "preuploadID")]
    preupload_id: &'a str,
    #[serde(rename = "sliceNo")]
    slice_no: u32,
}

#[derive(Serialize)]
struct PreuploadRequest<'a> {
    #[serde(rename = "preuploadID")]
    preupload_id: &'a str,
}

/// 创建上传任务；服务端已有相同 MD5 内容时直接秒传。
pub fn create_upload(
    api: &ApiClient,
    token: &AccessToken,
    parent_folder_id: FileId,
    filename: &str,
    content_hash: &str,
    size_bytes: u64,
) -> PanResult<UploadCreateResult> {
    let request = CreateRequest {
        parent_file_id: parent_folder_id,
        filename,
        etag: content_hash,
        size: size_bytes,
    };
    let dto: CreateDto = api.post(CREATE_PATH, &request, Some(token))?;
    Ok(dto.into())
}

/// 获取第 `slice_no` 片（从 1 开始）的一次性上传地址。
pub fn get_slice_upload_url(
    api: &ApiClient,
    token: &AccessToken,
    preupload_id: &str,
    slice_no: u32,
) -> PanResult<String> {
    let request = SliceUrlRequest {
        preupload_id,
        slice_no,
    };
    let dto: SliceUrlDto = api.post(SLICE_URL_PATH, &request, Some(token))?;
    dto.presigned_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| PanError::Protocol(format!("no upload url returned for slice {slice_no}")))
}

pub fn complete_upload(
    api: &ApiClient,
    token: &AccessToken,
    preupload_id: &str,
) -> PanResult<UploadCompleteResult> {
    let dto: CompleteDto = api.post(
        COMPLETE_PATH,
        &PreuploadRequest { preupload_id },
        Some(token),
    )?;
    Ok(UploadCompleteResult {
        completed: dto.completed,
        is_async: dto.is_async,
        file_id: dto.file_id.filter(|id| *id != 0),
    })
}

/// 单次查询异步合并结果；重试节奏由调用方决定。
pub fn poll_upload_result(
    api: &ApiClient,
    token: &AccessToken,
    preupload_id: &str,
) -> PanResult<UploadPollResult> {
    let dto: PollDto = api.post(
        ASYNC_RESULT_PATH,
        &PreuploadRequest { preupload_id },
        Some(token),
    )?;
    Ok(UploadPollResult {
        completed: dto.completed,
        file_id: dto.file_id.filter(|id| *id != 0),
    })
}

/// 把分片原样 PUT 到签名地址。地址本身即授权，不带鉴权头；任何 2xx 都算成功。
/// 返回服务端状态码，由调用方决定如何失败。
pub fn put_slice(api: &ApiClient, url: &str, bytes: Vec<u8>) -> PanResult<reqwest::StatusCode> {
    let response = api
        .transfer_http()
        .put(url)
        .header("Content-Type", "application/octet-stream")
        .body(bytes)
        .send()
        .map_err(|e| PanError::Network(format!("failed to upload slice: {e}")))?;
    Ok(response.status())
}

#[derive(Debug, Deserialize)]
struct CreateDto {
    #[serde(rename = "fileID", default)]
    file_id: Option<FileId>,
    #[serde(default)]
    reuse: bool,
    #[serde(rename = "preuploadID", default)]
    preupload_id: Option<String>,
    #[serde(rename = "sliceSize", default)]
    slice_size: Option<u64>,
}

impl From<CreateDto> for UploadCreateResult {
    fn from(value: CreateDto) -> Self {
        UploadCreateResult {
            reused: value.reuse,
            file_id: value.file_id.filter(|id| *id != 0),
            preupload_id: value.preupload_id.filter(|id| !id.trim().is_empty()),
            slice_size_bytes: value.slice_size.filter(|size| *size > 0),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SliceUrlDto {
    #[serde(rename = "presignedURL", default)]
    presigned_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompleteDto {
    #[serde(default)]
    completed: bool,
    #[serde(rename = "async", default)]
    is_async: bool,
    #[serde(rename = "fileID", default)]
    file_id: Option<FileId>,
}

#[derive(Debug, Deserialize)]
struct PollDto {
    #[serde(default)]
    completed: bool,
    #[serde(rename = "fileID", default)]
    file_id: Option<FileId>,
}
