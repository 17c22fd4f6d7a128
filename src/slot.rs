use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 单槽位占用标记：同一时间只允许一个同类传输运行，不排队。
#[derive(Clone, Default)]
pub(crate) struct ActiveSlot {
    busy: Arc<AtomicBool>,
}

impl ActiveSlot {
    pub(crate) fn try_acquire(&self) -> Option<SlotPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotPermit {
                busy: self.busy.clone(),
            })
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// 持有期间槽位被占用，drop 时释放（包括线程 panic 展开）。
pub(crate) struct SlotPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
