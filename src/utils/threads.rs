//! 并发工具

use futures::StreamExt;
use futures::stream;
use std::future::Future;

/// 有界并发执行一组future，结果按输入顺序返回
pub async fn do_parallel_with_limit<T, F>(tasks: Vec<F>, limit: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    stream::iter(tasks)
        .buffered(limit.max(1))
        .collect::<Vec<T>>()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let tasks: Vec<_> = (0..10u64)
            .map(|i| async move {
                // 靠后的任务先完成，验证顺序仍按输入保持
                tokio::time::sleep(std::time::Duration::from_millis(20 - i)).await;
                i
            })
            .collect();
        let results = do_parallel_with_limit(tasks, 3).await;
        assert_eq!(results, (0..10u64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_zero_limit_clamped() {
        let tasks: Vec<_> = (0..3u32).map(|i| async move { i * 2 }).collect();
        let results = do_parallel_with_limit(tasks, 0).await;
        assert_eq!(results, vec![0, 2, 4]);
    }
}
