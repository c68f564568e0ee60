//! 测试入口：启动reference（以及需要时的candidate），执行场景，结束时清理

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    command::Command,
    config::{Config, ServerConfig, Target},
    dual::Dual,
    ephemeral::Ephemeral,
    error::SetupError,
    judge::Judge,
    runner::{self, Stream},
    sink::FailureSink,
};

#[derive(Debug)]
enum Candidate {
    Remote(String),
    Local(Ephemeral),
}

impl Candidate {
    fn addr(&self) -> &str {
        match self {
            Candidate::Remote(addr) => addr,
            Candidate::Local(server) => server.addr(),
        }
    }
}

/// 一次场景使用的两个server，drop的时候临时server会被杀掉
pub struct Harness {
    reference: Ephemeral,
    candidate: Candidate,
    judge: Judge,
    stream_buffer: usize,
    sink: Arc<dyn FailureSink>,
}

impl Harness {
    pub async fn start(config: &Config, sink: Arc<dyn FailureSink>) -> Result<Harness, SetupError> {
        Harness::start_with(config, config.reference.clone(), sink).await
    }

    /// 两边都需要先AUTH才能执行命令
    ///
    /// candidate是已经运行的server时，需要调用方自己给它配置好同样的密码
    pub async fn start_with_auth(
        config: &Config,
        password: &str,
        sink: Arc<dyn FailureSink>,
    ) -> Result<Harness, SetupError> {
        let server = ServerConfig {
            password: Some(password.to_string()),
            ..config.reference.clone()
        };
        Harness::start_with(config, server, sink).await
    }

    async fn start_with(
        config: &Config,
        server: ServerConfig,
        sink: Arc<dyn FailureSink>,
    ) -> Result<Harness, SetupError> {
        let reference = Ephemeral::start(&server).await?;

        // reference已经启动，如果candidate启动失败，reference会随着drop被清理
        let candidate = match &config.candidate {
            Target::Address(addr) => {
                if server.password.is_some() {
                    warn!(%addr, "candidate is not managed by the harness, its password must already be set");
                }
                Candidate::Remote(addr.clone())
            }
            Target::Spawn(executable) => {
                let server = ServerConfig {
                    executable: executable.clone(),
                    ..server
                };
                Candidate::Local(Ephemeral::start(&server).await?)
            }
        };

        info!(
            candidate = candidate.addr(),
            reference = reference.addr(),
            "harness started"
        );

        Ok(Harness {
            reference,
            candidate,
            judge: Judge::new(config.error_rule),
            stream_buffer: config.stream_buffer,
            sink,
        })
    }

    pub fn candidate_addr(&self) -> &str {
        self.candidate.addr()
    }

    pub fn reference_addr(&self) -> &str {
        self.reference.addr()
    }

    /// 在一对新的连接上按顺序执行一个场景，返回不一致的数量
    pub async fn run(&self, commands: &[Command]) -> Result<usize, SetupError> {
        let mut dual = Dual::dial(self.candidate_addr(), self.reference_addr()).await?;
        Ok(runner::run(&mut dual, commands, self.judge, self.sink.as_ref()).await)
    }

    /// 每个stream一对连接，并发执行
    pub async fn run_concurrent(&self, streams: Vec<Stream>) -> Result<(), SetupError> {
        runner::run_concurrent(
            self.candidate_addr(),
            self.reference_addr(),
            streams,
            self.judge,
            Arc::clone(&self.sink),
            self.stream_buffer,
        )
        .await
    }

    /// 杀掉所有临时server
    pub async fn close(self) {
        let Harness {
            reference,
            candidate,
            ..
        } = self;
        if let Candidate::Local(server) = candidate {
            server.close().await;
        }
        reference.close().await;
    }
}

/// 启动server，执行一个场景，然后清理
pub async fn test_commands(
    config: &Config,
    sink: Arc<dyn FailureSink>,
    commands: &[Command],
) -> Result<(), SetupError> {
    let harness = Harness::start(config, sink).await?;
    let result = harness.run(commands).await;
    harness.close().await;
    result.map(|_| ())
}

/// 和 [`test_commands`] 一样，但是两边都设置了密码
pub async fn test_auth_commands(
    config: &Config,
    password: &str,
    sink: Arc<dyn FailureSink>,
    commands: &[Command],
) -> Result<(), SetupError> {
    let harness = Harness::start_with_auth(config, password, sink).await?;
    let result = harness.run(commands).await;
    harness.close().await;
    result.map(|_| ())
}

/// 和 [`test_commands`] 一样，但是每个stream使用自己的连接并发执行
pub async fn test_multi_commands(
    config: &Config,
    sink: Arc<dyn FailureSink>,
    streams: Vec<Stream>,
) -> Result<(), SetupError> {
    let harness = Harness::start(config, sink).await?;
    let result = harness.run_concurrent(streams).await;
    harness.close().await;
    result
}
