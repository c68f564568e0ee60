use std::sync::{Mutex, PoisonError};

use tracing::warn;

use crate::judge::Divergence;

/// 接收比较失败的记录，多个并发的stream会同时调用 `record`
pub trait FailureSink: Send + Sync {
    fn record(&self, divergence: Divergence);
}

/// 把所有的不一致记录下来，场景结束后统一检查
#[derive(Debug, Default)]
pub struct Collector {
    divergences: Mutex<Vec<Divergence>>,
}

impl Collector {
    pub fn new() -> Collector {
        Collector::default()
    }

    pub fn divergences(&self) -> Vec<Divergence> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 测试中使用：如果有任何不一致，把它们全部打印出来并panic
    pub fn assert_clean(&self) {
        let divergences = self.lock();
        if divergences.is_empty() {
            return;
        }

        let report = divergences
            .iter()
            .enumerate()
            .map(|(i, d)| format!("  {}: {}", i + 1, d))
            .collect::<Vec<_>>()
            .join("\n");
        panic!(
            "{} divergence(s) between candidate and reference:\n{}",
            divergences.len(),
            report
        );
    }

    // sink只会追加记录，持有锁的线程panic之后数据依然可用
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Divergence>> {
        self.divergences.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FailureSink for Collector {
    fn record(&self, divergence: Divergence) {
        warn!(%divergence, "divergence");
        self.lock().push(divergence);
    }
}
