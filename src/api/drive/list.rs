use super::models::{FileCategory, FileEntry, FileId, FilePage, FileStatus};
use crate::api::auth::AccessToken;
use crate::api::client::ApiClient;
use crate::error::PanResult;
use crate::settings::PAGE_SIZE;
use serde::Deserialize;

const LIST_PATH: &str = "/api/v2/file/list";

/// 拉取指定目录下的一页子项。
/// `after` 传入上一页返回的游标即可继续；回收站中的条目在这里直接过滤掉。
pub fn list_files(
    api: &ApiClient,
    token: &AccessToken,
    folder_id: FileId,
    after: Option<FileId>,
) -> PanResult<FilePage> {
    let mut query = vec![
        ("parentFileId", folder_id.to_string()),
        ("limit", PAGE_SIZE.to_string()),
    ];
    if let Some(cursor) = after {
        query.push(("lastFileId", cursor.to_string()));
    }

    let payload: FileListData = api.get(LIST_PATH, &query, token)?;
    let entries: Vec<FileEntry> = payload
        .file_list
        .into_iter()
        .filter(|item| item.trashed != 1)
        .map(FileEntry::from)
        .collect();
    let next_cursor = normalize_cursor(payload.last_file_id.as_ref());
    tracing::debug!(folder_id, count = entries.len(), ?next_cursor, "listed folder page");

    Ok(FilePage {
        entries,
        next_cursor,
    })
}

/// 服务端用 -1 表示没有下一页，旧版本也可能返回 null / 0 / 空串，一律视为结束。
fn normalize_cursor(raw: Option<&serde_json::Value>) -> Option<FileId> {
    match raw? {
        serde_json::Value::Number(n) => n.as_i64().filter(|v| *v > 0).map(|v| v as FileId),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|v| *v > 0)
            .map(|v| v as FileId),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListData {
    #[serde(default)]
    file_list: Vec<FileItemDto>,
    #[serde(default)]
    last_file_id: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileItemDto {
    file_id: FileId,
    #[serde(default)]
    filename: String,
    #[serde(rename = "type", default)]
    kind: i64,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    etag: String,
    #[serde(default)]
    status: i64,
    #[serde(default)]
    parent_file_id: FileId,
    #[serde(default)]
    category: i64,
    #[serde(default)]
    trashed: i64,
}

impl From<FileItemDto> for FileEntry {
    fn from(value: FileItemDto) -> Self {
        FileEntry {
            id: value.file_id,
            name: value.filename,
            is_folder: value.kind == 1,
            size_bytes: value.size,
            content_hash: value.etag,
            category: FileCategory::from_code(value.category),
            status: FileStatus::from_code(value.status),
            parent_id: value.parent_file_id,
            trashed: value.trashed == 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ClientConfig;
    use chrono::{Duration, Utc};
    use httpmock::prelude::*;
    use serde_json::{json, Value};

    fn api_for(server: &MockServer) -> ApiClient {
        ApiClient::new(&ClientConfig::with_endpoints(
            server.base_url(),
            std::env::temp_dir(),
        ))
        .unwrap()
    }

    fn token() -> AccessToken {
        AccessToken::new("tok", (Utc::now() + Duration::hours(1)).fixed_offset())
    }

    fn item(id: u64, trashed: bool) -> Value {
        json!({
            "fileId": id,
            "filename": format!("file-{id}.bin"),
            "type": 0,
            "size": id * 10,
            "etag": format!("{id:032x}"),
            "status": 0,
            "parentFileId": 7,
            "category": 3,
            "trashed": if trashed { 1 } else { 0 }
        })
    }

    fn page_body(ids: std::ops::RangeInclusive<u64>, trashed_every: u64, last: i64) -> Value {
        let mut list = Vec::new();
        for id in ids {
            list.push(item(id, false));
            if id % trashed_every == 0 {
                list.push(item(100_000 + id, true));
            }
        }
        json!({"code": 0, "message": "ok", "data": {"fileList": list, "lastFileId": last}})
    }

    #[test]
    fn maps_entries_and_sends_expected_query() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path(LIST_PATH)
                .query_param("parentFileId", "7")
                .query_param("limit", "100")
                .header("Authorization", "Bearer tok")
                .header("Platform", "open_platform");
            then.status(200).json_body(json!({
                "code": 0,
                "data": {
                    "fileList": [
                        {"fileId": 1, "filename": "docs", "type": 1, "size": 0, "etag": "",
                         "status": 0, "parentFileId": 7, "category": 0, "trashed": 0},
                        {"fileId": 2, "filename": "old.txt", "type": 0, "size": 5, "etag": "x",
                         "status": 0, "parentFileId": 7, "category": 0, "trashed": 1},
                        {"fileId": 3, "filename": "song.mp3", "type": 0, "size": 2048,
                         "etag": "abc", "status": 120, "parentFileId": 7, "category": 1,
                         "trashed": 0}
                    ],
                    "lastFileId": -1
                }
            }));
        });

        let page = list_files(&api_for(&server), &token(), 7, None).unwrap();
        mock.assert();
        assert_eq!(page.next_cursor, None);
        assert_eq!(page.entries.len(), 2);
        assert!(page.entries[0].is_folder);
        assert_eq!(page.entries[1].name, "song.mp3");
        assert_eq!(page.entries[1].category, FileCategory::Audio);
        assert_eq!(page.entries[1].status, FileStatus::Rejected);
        assert!(page.entries.iter().all(|e| !e.trashed));
    }

    #[test]
    fn cursor_pagination_reconstructs_every_entry_once() {
        let server = MockServer::start();
        let api = api_for(&server);
        let token = token();
        let mut collected = Vec::new();

        let mut first = server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("parentFileId", "7");
            then.status(200).json_body(page_body(1..=100, 25, 100));
        });
        let page = list_files(&api, &token, 7, None).unwrap();
        first.assert();
        first.delete();
        collected.extend(page.entries);
        assert_eq!(page.next_cursor, Some(100));

        let mut second = server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("lastFileId", "100");
            then.status(200).json_body(page_body(101..=200, 25, 200));
        });
        let page = list_files(&api, &token, 7, Some(100)).unwrap();
        second.assert();
        second.delete();
        collected.extend(page.entries);
        assert_eq!(page.next_cursor, Some(200));

        let third = server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("lastFileId", "200");
            then.status(200).json_body(page_body(201..=250, 25, -1));
        });
        let page = list_files(&api, &token, 7, Some(200)).unwrap();
        third.assert();
        collected.extend(page.entries);
        assert_eq!(page.next_cursor, None);

        let ids: Vec<u64> = collected.iter().map(|e| e.id).collect();
        assert_eq!(ids, (1..=250).collect::<Vec<_>>());
        assert!(collected.iter().all(|e| !e.trashed));
    }

    #[test]
    fn remote_error_code_is_surfaced() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(LIST_PATH);
            then.status(200)
                .json_body(json!({"code": 401, "message": "token invalid"}));
        });
        let err = list_files(&api_for(&server), &token(), 0, None).unwrap_err();
        assert_eq!(err.to_string(), "remote error 401: token invalid");
    }

    #[test]
    fn sentinel_cursors_end_the_listing() {
        assert_eq!(normalize_cursor(None), None);
        assert_eq!(normalize_cursor(Some(&Value::Null)), None);
        assert_eq!(normalize_cursor(Some(&json!(-1))), None);
        assert_eq!(normalize_cursor(Some(&json!(0))), None);
        assert_eq!(normalize_cursor(Some(&json!(""))), None);
        assert_eq!(normalize_cursor(Some(&json!(42))), Some(42));
        assert_eq!(normalize_cursor(Some(&json!("42"))), Some(42));
    }
}
