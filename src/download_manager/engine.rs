use crate::api::auth::TokenSource;
use crate::api::client::ApiClient;
use crate::api::drive::{self, DownloadResult, FileId};
use crate::error::{PanError, PanResult};
use crate::progress::{ProgressReporter, TransferOutcome, TransferProgress};
use crate::settings::ClientConfig;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use url::Url;

/// 把签名地址的响应体按块写入本地文件。
/// 失败时已写入的部分文件保留在磁盘上，调用方应视其为无效。
#[derive(Clone, Debug)]
pub struct DownloadEngine {
    api: ApiClient,
    chunk_size: usize,
}

impl DownloadEngine {
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        Self {
            api,
            chunk_size: config.download_chunk_size.max(1),
        }
    }

    /// 先换取文件的下载地址，再下载；恰好汇报一次终态。
    pub fn run(
        &self,
        tokens: &dyn TokenSource,
        file_id: FileId,
        destination: &Path,
        reporter: &dyn ProgressReporter,
    ) -> TransferOutcome {
        let result = tokens
            .token()
            .and_then(|token| drive::get_download_url(&self.api, &token, file_id))
            .and_then(|url| self.download(&url, destination, reporter));
        let outcome = match result {
            Ok(done) => TransferOutcome::Downloaded {
                saved_path: done.saved_path,
                bytes: done.bytes_downloaded,
            },
            Err(err) => TransferOutcome::Failed {
                message: format!("download of file {file_id} failed: {err}"),
            },
        };
        reporter.finished(outcome.clone());
        outcome
    }

    /// 下载任意签名地址到 `destination`，覆盖已有文件。不携带鉴权头。
    pub fn download(
        &self,
        url: &str,
        destination: &Path,
        reporter: &dyn ProgressReporter,
    ) -> PanResult<DownloadResult> {
        let url = Url::parse(url)
            .map_err(|e| PanError::Protocol(format!("invalid download url: {e}")))?;
        let mut response = self
            .api
            .transfer_http()
            .get(url)
            .send()
            .map_err(|e| PanError::Network(format!("failed to download file: {e}")))?;
        if !response.status().is_success() {
            return Err(PanError::Network(format!(
                "download endpoint returned HTTP {}",
                response.status()
            )));
        }

        let expected_size = response.content_length();
        let total = expected_size.unwrap_or(0);
        tracing::info!(
            destination = %destination.display(),
            expected_size = total,
            "starting download"
        );

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(destination)?);

        let mut buf = vec![0u8; self.chunk_size];
        let mut downloaded = 0u64;
        reporter.progress(progress(0, total));
        loop {
            let n = response
                .read(&mut buf)
                .map_err(|e| PanError::Network(format!("download interrupted: {e}")))?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
            downloaded += n as u64;
            reporter.progress(progress(downloaded, total));
        }
        writer.flush()?;

        tracing::info!(
            destination = %destination.display(),
            bytes = downloaded,
            "download finished"
        );
        Ok(DownloadResult {
            saved_path: destination.to_string_lossy().into_owned(),
            bytes_downloaded: downloaded,
            expected_size,
        })
    }
}

fn progress(done: u64, total: u64) -> TransferProgress {
    let label = if total > 0 {
        format!(
            "{} / {}",
            drive::format_file_size(done),
            drive::format_file_size(total)
        )
    } else {
        drive::format_file_size(done)
    };
    TransferProgress {
        units_done: done,
        units_total: total,
        label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::AccessToken;
    use crate::progress::RecordingReporter;
    use chrono::{Duration, Utc};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::net::TcpListener;
    use std::thread;
    use tempfile::TempDir;

    const ONE_MIB: usize = 1_048_576;

    fn engine_for(server: &MockServer, dir: &TempDir) -> DownloadEngine {
        let config = ClientConfig::with_endpoints(server.base_url(), dir.path());
        DownloadEngine::new(ApiClient::new(&config).unwrap(), &config)
    }

    #[test]
    fn streams_body_to_disk_with_byte_progress() {
        let server = MockServer::start();
        let payload: Vec<u8> = (0..ONE_MIB).map(|i| (i % 251) as u8).collect();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/blob");
            then.status(200).body(payload.clone());
        });
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("nested/out.bin");
        let reporter = RecordingReporter::default();

        let result = engine_for(&server, &dir)
            .download(&server.url("/blob"), &destination, &reporter)
            .unwrap();
        mock.assert();
        assert_eq!(result.bytes_downloaded, ONE_MIB as u64);
        assert_eq!(result.expected_size, Some(ONE_MIB as u64));
        assert_eq!(fs::metadata(&destination).unwrap().len(), ONE_MIB as u64);
        assert_eq!(fs::read(&destination).unwrap(), payload);

        let events = reporter.progress_events();
        let last = events.last().unwrap();
        assert_eq!(last.units_done, ONE_MIB as u64);
        assert_eq!(last.units_total, ONE_MIB as u64);
        assert!(events
            .windows(2)
            .all(|pair| pair[0].units_done <= pair[1].units_done));
    }

    /// 单次应答的原始 HTTP 服务，用于构造 httpmock 无法表达的畸形响应。
    fn serve_raw_once(head: &str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let head = head.to_string();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut byte = [0u8; 1];
            while !request.ends_with(b"\r\n\r\n") {
                if stream.read(&mut byte).unwrap() == 0 {
                    return;
                }
                request.push(byte[0]);
            }
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(&body).unwrap();
            stream.flush().unwrap();
        });
        format!("http://{addr}/file")
    }

    fn chunked(body: &[u8], chunk: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for part in body.chunks(chunk) {
            out.extend_from_slice(format!("{:x}\r\n", part.len()).as_bytes());
            out.extend_from_slice(part);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"0\r\n\r\n");
        out
    }

    #[test]
    fn truncated_body_fails_and_leaves_the_partial_file() {
        let dir = TempDir::new().unwrap();
        let url = serve_raw_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 100000\r\nConnection: close\r\n\r\n",
            vec![7u8; 50_000],
        );
        let destination = dir.path().join("partial.bin");
        let reporter = RecordingReporter::default();
        let config = ClientConfig::with_endpoints("http://127.0.0.1:9", dir.path());
        let engine = DownloadEngine::new(ApiClient::new(&config).unwrap(), &config);

        let err = engine.download(&url, &destination, &reporter).unwrap_err();
        assert!(matches!(err, PanError::Network(_)), "{err:?}");

        let written = fs::metadata(&destination).unwrap().len();
        assert!(written > 0 && written < 100_000, "{written}");
        let last = reporter.progress_events().last().cloned().unwrap();
        assert_eq!(last.units_total, 100_000);
        assert_eq!(last.units_done, written);
    }

    #[test]
    fn unknown_length_reports_bytes_only() {
        let dir = TempDir::new().unwrap();
        let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 256) as u8).collect();
        let url = serve_raw_once(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
            chunked(&payload, 3_000),
        );
        let destination = dir.path().join("stream.bin");
        let reporter = RecordingReporter::default();
        let config = ClientConfig::with_endpoints("http://127.0.0.1:9", dir.path());
        let engine = DownloadEngine::new(ApiClient::new(&config).unwrap(), &config);

        let result = engine.download(&url, &destination, &reporter).unwrap();
        assert_eq!(result.expected_size, None);
        assert_eq!(result.bytes_downloaded, 20_000);
        assert_eq!(fs::read(&destination).unwrap(), payload);

        let events = reporter.progress_events();
        assert!(events.iter().all(|p| p.units_total == 0));
        assert_eq!(events.last().unwrap().units_done, 20_000);
    }

    #[test]
    fn http_error_fails_without_creating_the_file() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/gone");
            then.status(404);
        });
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("out.bin");

        let err = engine_for(&server, &dir)
            .download(
                &server.url("/gone"),
                &destination,
                &RecordingReporter::default(),
            )
            .unwrap_err();
        assert!(matches!(err, PanError::Network(_)));
        assert!(!destination.exists());
    }

    #[test]
    fn existing_file_is_overwritten() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/small");
            then.status(200).body("new");
        });
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("out.txt");
        fs::write(&destination, "much older content").unwrap();

        engine_for(&server, &dir)
            .download(
                &server.url("/small"),
                &destination,
                &RecordingReporter::default(),
            )
            .unwrap();
        assert_eq!(fs::read_to_string(&destination).unwrap(), "new");
    }

    #[test]
    fn run_resolves_the_file_id_and_reports_once() {
        let server = MockServer::start();
        let url = server.url("/signed/42");
        let info = server.mock(move |when, then| {
            when.method(GET)
                .path("/api/v1/file/download_info")
                .query_param("fileId", "42");
            then.status(200)
                .json_body(json!({"code": 0, "data": {"downloadUrl": url}}));
        });
        let blob = server.mock(|when, then| {
            when.method(GET).path("/signed/42");
            then.status(200).body("payload");
        });
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("42.txt");
        let token = AccessToken::new("tok", (Utc::now() + Duration::hours(1)).fixed_offset());
        let reporter = RecordingReporter::default();

        let outcome = engine_for(&server, &dir).run(&token, 42, &destination, &reporter);
        info.assert();
        blob.assert();
        assert_eq!(
            outcome,
            TransferOutcome::Downloaded {
                saved_path: destination.to_string_lossy().into_owned(),
                bytes: 7
            }
        );
        assert_eq!(reporter.outcomes(), vec![outcome]);
    }

    #[test]
    fn unresolvable_file_reports_failure_once() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/file/download_info");
            then.status(200)
                .json_body(json!({"code": 5066, "message": "file not found"}));
        });
        let dir = TempDir::new().unwrap();
        let token = AccessToken::new("tok", (Utc::now() + Duration::hours(1)).fixed_offset());
        let reporter = RecordingReporter::default();

        let outcome =
            engine_for(&server, &dir).run(&token, 7, &dir.path().join("x"), &reporter);
        match &outcome {
            TransferOutcome::Failed { message } => assert!(message.contains("file not found")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(reporter.outcomes().len(), 1);
        assert!(reporter.progress_events().is_empty());
    }
}
