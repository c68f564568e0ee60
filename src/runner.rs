//! 按顺序执行命令并比较结果，以及多个连接并发执行的版本

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::{sync::mpsc, task::JoinSet};
use tracing::debug;

use crate::{
    command::Command,
    dual::Dual,
    error::SetupError,
    judge::Judge,
    sink::FailureSink,
};

/// 在一对连接上严格按顺序执行命令，返回不一致的数量
///
/// 命令可能有副作用（修改数据、MULTI、SELECT），所以不能打乱顺序
pub async fn run(dual: &mut Dual, commands: &[Command], judge: Judge, sink: &dyn FailureSink) -> usize {
    let mut divergences = 0;
    for command in commands {
        let (candidate, reference) = dual.execute(command).await;
        if !judge.check(command, candidate, reference, sink) {
            divergences += 1;
        }
    }
    divergences
}

/// stream中用来逐条发送命令的一端
#[derive(Debug, Clone)]
pub struct Producer {
    tx: mpsc::Sender<Command>,
}

impl Producer {
    /// 发送下一条命令，执行端已经退出时返回false
    pub async fn send(&self, command: Command) -> bool {
        self.tx.send(command).await.is_ok()
    }
}

/// 一个独立的命令序列，在自己的连接上执行
pub type Stream = Box<dyn FnOnce(Producer) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// 用一个异步函数来生成命令
pub fn stream<F, Fut>(f: F) -> Stream
where
    F: FnOnce(Producer) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Box::new(move |producer| Box::pin(f(producer)))
}

/// 用一个迭代器来生成命令，迭代器是惰性求值的
pub fn stream_iter<I>(commands: I) -> Stream
where
    I: IntoIterator<Item = Command> + Send + 'static,
    I::IntoIter: Send,
{
    stream(move |producer| async move {
        for command in commands {
            if !producer.send(command).await {
                break;
            }
        }
    })
}

/// 每个stream使用一对新的连接并发执行，所有stream都执行完之后返回
///
/// 同一个stream内的命令保持顺序，不同stream之间没有顺序保证。
/// stream中的panic会在所有stream结束之后重新抛出。
pub async fn run_concurrent(
    candidate: &str,
    reference: &str,
    streams: Vec<Stream>,
    judge: Judge,
    sink: Arc<dyn FailureSink>,
    buffer: usize,
) -> Result<(), SetupError> {
    // 每个stream一对连接，开始执行之前全部连接好
    let mut duals = Vec::with_capacity(streams.len());
    for _ in 0..streams.len() {
        duals.push(Dual::dial(candidate, reference).await?);
    }

    let mut workers = JoinSet::new();
    for (id, (stream, mut dual)) in streams.into_iter().zip(duals).enumerate() {
        let sink = Arc::clone(&sink);

        workers.spawn(async move {
            // 生产者可以提前生成下一条命令，消费者在等待网络响应
            let (tx, mut rx) = mpsc::channel(buffer.max(1));
            let producer = tokio::spawn(stream(Producer { tx }));

            let mut executed = 0usize;
            while let Some(command) = rx.recv().await {
                let (c, r) = dual.execute(&command).await;
                judge.check(&command, c, r, sink.as_ref());
                executed += 1;
            }
            debug!(stream = id, executed, "stream finished");

            producer.await
        });
    }

    let mut panic = None;
    while let Some(joined) = workers.join_next().await {
        let result = joined.and_then(|producer| producer);
        if let Err(err) = result {
            if err.is_panic() && panic.is_none() {
                panic = Some(err.into_panic());
            }
        }
    }

    if let Some(payload) = panic {
        std::panic::resume_unwind(payload);
    }

    Ok(())
}
