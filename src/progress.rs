//! 传输进度与终态事件。后台线程只写入 [`ProgressReporter`]，前端通过订阅通道读取，
//! 不依赖任何 UI 框架的事件系统。

use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// 同一传输两次字节进度事件之间的最小间隔；跨过 1% 或到达终点时不受限。
const PROGRESS_MIN_INTERVAL: Duration = Duration::from_millis(300);

/// 传输种类，用于忙碌检测与事件分流。
#[flutter_rust_bridge::frb]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransferKind {
    Upload,
    Download,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Upload => f.write_str("upload"),
            TransferKind::Download => f.write_str("download"),
        }
    }
}

/// 上传以分片为单位，下载以字节为单位；`units_total == 0` 表示总量未知。
#[flutter_rust_bridge::frb]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferProgress {
    pub units_done: u64,
    pub units_total: u64,
    pub label: String,
}

#[flutter_rust_bridge::frb]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    Uploaded { file_id: u64, reused: bool },
    Downloaded { saved_path: String, bytes: u64 },
    Failed { message: String },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, TransferOutcome::Failed { .. })
    }
}

#[flutter_rust_bridge::frb]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferEventKind {
    Progress(TransferProgress),
    Finished(TransferOutcome),
}

#[flutter_rust_bridge::frb]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferEvent {
    pub transfer_id: String,
    pub kind: TransferKind,
    pub event: TransferEventKind,
    pub timestamp_millis: i64,
}

/// 后台传输的句柄。调用方可以丢弃它，事件仍会通过 [`EventHub`] 送达。
#[flutter_rust_bridge::frb(opaque)]
pub struct TransferHandle {
    transfer_id: String,
    kind: TransferKind,
    join: JoinHandle<TransferOutcome>,
}

impl TransferHandle {
    pub(crate) fn new(
        transfer_id: String,
        kind: TransferKind,
        join: JoinHandle<TransferOutcome>,
    ) -> Self {
        Self {
            transfer_id,
            kind,
            join,
        }
    }

    pub fn transfer_id(&self) -> &str {
        &self.transfer_id
    }

    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// 阻塞等待传输结束。后台线程 panic 时同样以 `Failed` 返回。
    pub fn wait(self) -> TransferOutcome {
        self.join.join().unwrap_or_else(|_| TransferOutcome::Failed {
            message: format!("{} worker panicked", self.kind),
        })
    }
}

/// 引擎向外汇报的唯一出口。
/// `finished` 对每次传输恰好调用一次；`progress` 的 `units_done` 单调不减。
pub trait ProgressReporter: Send + Sync {
    fn progress(&self, progress: TransferProgress);
    fn finished(&self, outcome: TransferOutcome);
}

/// 多订阅者广播。订阅者断开后自动移除。
#[derive(Clone, Default)]
pub struct EventHub {
    subscribers: Arc<Mutex<Vec<Sender<TransferEvent>>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<TransferEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// 为一次传输生成带 id 的 reporter。
    pub fn reporter(&self, transfer_id: impl Into<String>, kind: TransferKind) -> HubReporter {
        HubReporter {
            hub: self.clone(),
            transfer_id: transfer_id.into(),
            kind,
            last_sent: Mutex::new(None),
        }
    }

    fn broadcast(&self, event: TransferEvent) {
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subs.retain(|sender| sender.send(event.clone()).is_ok());
    }
}

/// 向 [`EventHub`] 转发单个传输的事件。
/// 字节进度会被合并：订阅通道不设上限，合并保证慢速订阅者的积压与文件大小无关。
/// 状态切换（`units_done` 不变）与终态事件总是送达。
pub struct HubReporter {
    hub: EventHub,
    transfer_id: String,
    kind: TransferKind,
    last_sent: Mutex<Option<(TransferProgress, Instant)>>,
}

impl HubReporter {
    pub fn transfer_id(&self) -> &str {
        &self.transfer_id
    }

    fn should_emit(&self, progress: &TransferProgress) -> bool {
        let mut last = self
            .last_sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let emit = match last.as_ref() {
            None => true,
            Some((prev, at)) => {
                let known_total = progress.units_total > 0;
                let step = (progress.units_total / 100).max(1);
                let crossed_step =
                    known_total && progress.units_done >= prev.units_done.saturating_add(step);
                let reached_end = known_total && progress.units_done >= progress.units_total;
                progress.units_total != prev.units_total
                    || progress.units_done == prev.units_done
                    || crossed_step
                    || reached_end
                    || at.elapsed() >= PROGRESS_MIN_INTERVAL
            }
        };
        if emit {
            *last = Some((progress.clone(), Instant::now()));
        }
        emit
    }

    fn emit(&self, event: TransferEventKind) {
        self.hub.broadcast(TransferEvent {
            transfer_id: self.transfer_id.clone(),
            kind: self.kind,
            event,
            timestamp_millis: current_timestamp(),
        });
    }
}

impl ProgressReporter for HubReporter {
    fn progress(&self, progress: TransferProgress) {
        if self.should_emit(&progress) {
            self.emit(TransferEventKind::Progress(progress));
        }
    }

    fn finished(&self, outcome: TransferOutcome) {
        match &outcome {
            TransferOutcome::Failed { message } => tracing::warn!(
                transfer_id = %self.transfer_id,
                kind = %self.kind,
                "transfer failed: {message}"
            ),
            _ => tracing::info!(
                transfer_id = %self.transfer_id,
                kind = %self.kind,
                "transfer finished"
            ),
        }
        self.emit(TransferEventKind::Finished(outcome));
    }
}

/// 测试与无界面场景下使用的内存 reporter，按顺序记录全部事件。
#[derive(Default)]
pub struct RecordingReporter {
    progress: Mutex<Vec<TransferProgress>>,
    outcomes: Mutex<Vec<TransferOutcome>>,
}

impl RecordingReporter {
    pub fn progress_events(&self) -> Vec<TransferProgress> {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn outcomes(&self) -> Vec<TransferOutcome> {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn progress(&self, progress: TransferProgress) {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(progress);
    }

    fn finished(&self, outcome: TransferOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
    }
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or_default()
}
