//! 分批并发执行器 - 编排层
//!
//! 把有序列表切成若干个不超过 `window_size` 的连续批次：
//! 批内所有任务同时进行，整批全部结束后才开始下一批。
//! 任务结果按下标写回各自的位置，不受完成先后影响。

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 单个任务的结局
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<R> {
    /// 任务正常结束
    Completed(R),
    /// 任务 panic，附带 panic 信息
    Panicked(String),
    /// 批次被取消，任务没有派发
    Skipped,
}

/// 分批并发执行器
#[derive(Debug, Clone, Copy)]
pub struct WindowedExecutor {
    window_size: usize,
}

impl WindowedExecutor {
    /// `window_size` 至少为 1
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn window_count(&self, total: usize) -> usize {
        total.div_ceil(self.window_size)
    }

    /// 分批执行
    ///
    /// - `task(index, item)` 为每一项生成 future
    /// - 每当一项结束（含 panic）立即调用 `on_settle(index, &settled)`
    /// - `cancel` 在两批之间检查：当前批次会跑完，之后的项记为 `Skipped`
    ///
    /// 返回值与 `items` 等长、同序。
    pub async fn run<'a, T, R, F, Fut, S>(
        &self,
        items: &'a [T],
        cancel: Option<&CancellationToken>,
        task: F,
        mut on_settle: S,
    ) -> Vec<Settled<R>>
    where
        F: Fn(usize, &'a T) -> Fut,
        Fut: Future<Output = R> + 'a,
        S: FnMut(usize, &Settled<R>),
    {
        let total = items.len();
        let total_windows = self.window_count(total);
        let mut slots: Vec<Option<Settled<R>>> = (0..total).map(|_| None).collect();

        for (window_index, window_start) in (0..total).step_by(self.window_size).enumerate() {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                warn!(
                    "⏹️ 批次已取消，剩余 {} 项不再派发",
                    total - window_start
                );
                break;
            }

            let window_end = (window_start + self.window_size).min(total);
            debug!(
                "📦 第 {}/{} 批: {}-{} / 共 {} 项",
                window_index + 1,
                total_windows,
                window_start + 1,
                window_end,
                total
            );

            let mut in_flight: FuturesUnordered<_> = items[window_start..window_end]
                .iter()
                .enumerate()
                .map(|(offset, item)| {
                    let index = window_start + offset;
                    let future = task(index, item);
                    async move { (index, AssertUnwindSafe(future).catch_unwind().await) }
                })
                .collect();

            // 等待本批所有任务完成
            while let Some((index, result)) = in_flight.next().await {
                let settled = match result {
                    Ok(value) => Settled::Completed(value),
                    Err(panic) => Settled::Panicked(panic_message(panic.as_ref())),
                };
                on_settle(index, &settled);
                slots[index] = Some(settled);
            }

            debug!("✓ 第 {}/{} 批完成", window_index + 1, total_windows);
        }

        let skipped = slots.iter().filter(|slot| slot.is_none()).count();
        if skipped > 0 {
            info!("共 {} 项因取消未执行", skipped);
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or(Settled::Skipped))
            .collect()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知错误".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_follow_input_order_not_completion_order() {
        let executor = WindowedExecutor::new(4);
        let delays: Vec<u64> = vec![40, 10, 30, 0, 20, 5];
        let mut settle_order = Vec::new();

        let results = executor
            .run(
                &delays,
                None,
                |index, delay| async move {
                    tokio::time::sleep(Duration::from_millis(*delay)).await;
                    index * 10
                },
                |index, _| settle_order.push(index),
            )
            .await;

        assert_eq!(
            results,
            (0..6).map(|i| Settled::Completed(i * 10)).collect::<Vec<_>>()
        );
        // 第一批内按完成先后回调，第二批在第一批之后
        assert_eq!(&settle_order[..4], &[3, 1, 2, 0]);
        assert_eq!(&settle_order[4..], &[5, 4]);
    }

    #[tokio::test]
    async fn test_windows_run_sequentially() {
        let executor = WindowedExecutor::new(3);
        let items: Vec<usize> = (0..7).collect();
        let running = Cell::new(0usize);
        let peak = Cell::new(0usize);
        let started_before_window_done = Cell::new(false);
        let finished = Cell::new(0usize);

        executor
            .run(
                &items,
                None,
                |index, _| {
                    let running = &running;
                    let peak = &peak;
                    let finished = &finished;
                    let flag = &started_before_window_done;
                    async move {
                        // 第 n 批开始时，前面所有批次都必须已经结束
                        if finished.get() < (index / 3) * 3 {
                            flag.set(true);
                        }
                        running.set(running.get() + 1);
                        peak.set(peak.get().max(running.get()));
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        running.set(running.get() - 1);
                        finished.set(finished.get() + 1);
                    }
                },
                |_, _| {},
            )
            .await;

        assert_eq!(peak.get(), 3);
        assert!(!started_before_window_done.get());
        assert_eq!(executor.window_count(7), 3);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let executor = WindowedExecutor::new(2);
        let items = vec![1, 2, 3];

        let results = executor
            .run(
                &items,
                None,
                |_, value| async move {
                    if *value == 2 {
                        panic!("boom");
                    }
                    *value
                },
                |_, _| {},
            )
            .await;

        assert_eq!(results[0], Settled::Completed(1));
        assert_eq!(results[1], Settled::Panicked("boom".to_string()));
        assert_eq!(results[2], Settled::Completed(3));
    }

    #[tokio::test]
    async fn test_cancel_drains_current_window_then_skips() {
        let executor = WindowedExecutor::new(2);
        let items: Vec<usize> = (0..5).collect();
        let token = CancellationToken::new();

        let results = executor
            .run(
                &items,
                Some(&token),
                |index, _| {
                    let token = token.clone();
                    async move {
                        if index == 0 {
                            token.cancel();
                        }
                        index
                    }
                },
                |_, _| {},
            )
            .await;

        assert_eq!(results[0], Settled::Completed(0));
        assert_eq!(results[1], Settled::Completed(1));
        assert!(results[2..].iter().all(|r| *r == Settled::Skipped));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let executor = WindowedExecutor::new(0);
        let items: Vec<u8> = Vec::new();
        let results = executor
            .run(&items, None, |_, v| async move { *v }, |_, _| {})
            .await;
        assert!(results.is_empty());
        assert_eq!(executor.window_size(), 1);
    }
}
