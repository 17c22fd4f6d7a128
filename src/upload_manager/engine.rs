//! 分片上传状态机：
//! Hashing → Creating → {Reused | Slicing → UploadingSlice(1..=n) → Completing → {Done | Polling → Done}} | Failed。
//! 全程串行执行；任何一步失败都直接终止本次上传，不保留可续传的状态。

use crate::api::auth::TokenSource;
use crate::api::client::ApiClient;
use crate::api::drive::{self, FileId};
use crate::error::{PanError, PanResult};
use crate::progress::{ProgressReporter, TransferOutcome, TransferProgress};
use crate::settings::ClientConfig;
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    pub local_path: PathBuf,
    pub parent_folder_id: FileId,
}

/// 上传成功的终态。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadDone {
    pub file_id: FileId,
    pub file_name: String,
    /// 秒传命中，没有传输任何字节。
    pub reused: bool,
}

/// 一次上传期间的服务端会话，仅在 `upload` 调用内存活。
#[derive(Clone, Debug)]
pub struct UploadSession {
    pub preupload_id: String,
    pub slice_size_bytes: u64,
    pub total_slices: u32,
    pub local_path: PathBuf,
    pub content_hash: String,
    pub file_size_bytes: u64,
}

/// 一个分片在文件中的字节区间。`number` 从 1 开始。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceRange {
    pub number: u32,
    pub offset: u64,
    pub len: u64,
}

/// 按 `slice_size` 切分 `[0, file_size)`：共 `ceil(file_size / slice_size)` 片，最后一片可能更短。
pub fn plan_slices(file_size: u64, slice_size: u64) -> PanResult<Vec<SliceRange>> {
    if slice_size == 0 {
        return Err(PanError::Protocol("slice size must be positive".to_string()));
    }
    let count = file_size.div_ceil(slice_size);
    let count = u32::try_from(count)
        .map_err(|_| PanError::Protocol(format!("too many slices for one upload: {count}")))?;
    Ok((1..=count)
        .map(|number| {
            let offset = u64::from(number - 1) * slice_size;
            SliceRange {
                number,
                offset,
                len: slice_size.min(file_size - offset),
            }
        })
        .collect())
}

/// 流式计算整文件 MD5（小写十六进制），同时返回精确字节数。
pub fn compute_content_hash(path: &Path, block_size: usize) -> io::Result<(String, u64)> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; block_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((hex::encode(hasher.finalize()), total))
}

#[derive(Clone, Debug)]
pub struct UploadEngine {
    api: ApiClient,
    poll_interval: Duration,
    max_poll_attempts: u32,
    hash_block_size: usize,
}

impl UploadEngine {
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        Self {
            api,
            poll_interval: config.poll_interval,
            max_poll_attempts: config.max_poll_attempts,
            hash_block_size: config.hash_block_size,
        }
    }

    /// 执行上传并恰好汇报一次终态。
    pub fn run(
        &self,
        tokens: &dyn TokenSource,
        request: &UploadRequest,
        reporter: &dyn ProgressReporter,
    ) -> TransferOutcome {
        let outcome = match self.upload(tokens, request, reporter) {
            Ok(done) => TransferOutcome::Uploaded {
                file_id: done.file_id,
                reused: done.reused,
            },
            Err(err) => TransferOutcome::Failed {
                message: format!("upload of {} failed: {err}", request.local_path.display()),
            },
        };
        reporter.finished(outcome.clone());
        outcome
    }

    /// 状态机主体；只汇报进度，不汇报终态。
    pub fn upload(
        &self,
        tokens: &dyn TokenSource,
        request: &UploadRequest,
        reporter: &dyn ProgressReporter,
    ) -> PanResult<UploadDone> {
        let path = request.local_path.as_path();
        let file_name = upload_file_name(path)?;

        // Hashing
        report(reporter, 0, 0, format!("hashing {file_name}"));
        let (content_hash, file_size) = compute_content_hash(path, self.hash_block_size)?;
        tracing::debug!(%file_name, file_size, %content_hash, "hashed local file");

        // Creating
        report(reporter, 0, 0, format!("creating upload task for {file_name}"));
        let created = drive::create_upload(
            &self.api,
            &tokens.token()?,
            request.parent_folder_id,
            &file_name,
            &content_hash,
            file_size,
        )?;
        if created.reused {
            let file_id = created.file_id.ok_or_else(|| {
                PanError::Protocol("instant upload reported without a file id".to_string())
            })?;
            tracing::info!(%file_name, file_id, "content already on server; instant upload");
            return Ok(UploadDone {
                file_id,
                file_name,
                reused: true,
            });
        }
        let session = UploadSession {
            preupload_id: created.preupload_id.ok_or_else(|| {
                PanError::Protocol("create response is missing preuploadID".to_string())
            })?,
            slice_size_bytes: created.slice_size_bytes.ok_or_else(|| {
                PanError::Protocol("create response is missing sliceSize".to_string())
            })?,
            total_slices: 0,
            local_path: path.to_path_buf(),
            content_hash,
            file_size_bytes: file_size,
        };

        // Slicing
        let slices = plan_slices(session.file_size_bytes, session.slice_size_bytes)?;
        let session = UploadSession {
            total_slices: slices.len() as u32,
            ..session
        };
        tracing::info!(
            %file_name,
            preupload_id = %session.preupload_id,
            total_slices = session.total_slices,
            slice_size = session.slice_size_bytes,
            "starting sliced upload"
        );
        let total = u64::from(session.total_slices);
        report(reporter, 0, total, format!("uploading {total} slices"));

        // UploadingSlice(n)
        let mut file = File::open(&session.local_path)?;
        for slice in &slices {
            self.upload_slice(tokens, &session, &mut file, slice)?;
            report(
                reporter,
                u64::from(slice.number),
                total,
                format!("slice {}/{} uploaded", slice.number, session.total_slices),
            );
        }
        drop(file);

        // Completing
        report(reporter, total, total, "completing upload".to_string());
        let completed = drive::complete_upload(&self.api, &tokens.token()?, &session.preupload_id)?;
        let file_id = if completed.is_async {
            report(reporter, total, total, "waiting for server processing".to_string());
            self.poll_until_complete(tokens, &session)?
        } else if completed.completed {
            completed.file_id.ok_or_else(|| {
                PanError::Protocol("completed upload reported without a file id".to_string())
            })?
        } else {
            return Err(PanError::Protocol(
                "server reported the upload as incomplete".to_string(),
            ));
        };

        tracing::info!(%file_name, file_id, "upload completed");
        Ok(UploadDone {
            file_id,
            file_name,
            reused: false,
        })
    }

    fn upload_slice(
        &self,
        tokens: &dyn TokenSource,
        session: &UploadSession,
        file: &mut File,
        slice: &SliceRange,
    ) -> PanResult<()> {
        // 一次性地址必须紧挨着使用前获取。
        let url = drive::get_slice_upload_url(
            &self.api,
            &tokens.token()?,
            &session.preupload_id,
            slice.number,
        )?;

        file.seek(SeekFrom::Start(slice.offset))?;
        let mut bytes = vec![0u8; slice.len as usize];
        file.read_exact(&mut bytes)?;

        let status = drive::put_slice(&self.api, &url, bytes)?;
        if !status.is_success() {
            tracing::warn!(
                slice = slice.number,
                total = session.total_slices,
                %status,
                "slice upload rejected; aborting"
            );
            return Err(PanError::SliceRejected {
                slice_no: slice.number,
                total_slices: session.total_slices,
                status: status.as_u16(),
            });
        }
        tracing::debug!(slice = slice.number, total = session.total_slices, "slice uploaded");
        Ok(())
    }

    /// 固定间隔轮询异步合并结果，最多 `max_poll_attempts` 次；每次未完成后等待一个间隔。
    fn poll_until_complete(
        &self,
        tokens: &dyn TokenSource,
        session: &UploadSession,
    ) -> PanResult<FileId> {
        for attempt in 1..=self.max_poll_attempts {
            let result =
                drive::poll_upload_result(&self.api, &tokens.token()?, &session.preupload_id)?;
            if result.completed {
                return result.file_id.ok_or_else(|| {
                    PanError::Protocol("async upload completed without a file id".to_string())
                });
            }
            tracing::debug!(attempt, max = self.max_poll_attempts, "upload still processing");
            thread::sleep(self.poll_interval);
        }
        Err(PanError::Timeout(format!(
            "server did not finish processing after {} polls; check the folder later",
            self.max_poll_attempts
        )))
    }
}

fn upload_file_name(path: &Path) -> PanResult<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| {
            PanError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a file path: {}", path.display()),
            ))
        })
}

fn report(reporter: &dyn ProgressReporter, units_done: u64, units_total: u64, label: String) {
    reporter.progress(TransferProgress {
        units_done,
        units_total,
        label,
    });
}
