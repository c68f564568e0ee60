use tracing::debug;

use crate::{
    client::Client,
    command::Command,
    error::SetupError,
    value::Outcome,
};

/// 分别连接到candidate和reference的两个连接
#[derive(Debug)]
pub struct Dual {
    candidate: Client,
    reference: Client,
}

impl Dual {
    pub async fn dial(candidate: &str, reference: &str) -> Result<Dual, SetupError> {
        let candidate = dial(candidate).await?;
        let reference = dial(reference).await?;

        Ok(Dual {
            candidate,
            reference,
        })
    }

    /// 在两边执行同一条命令，返回 (candidate, reference) 的结果
    pub async fn execute(&mut self, command: &Command) -> (Outcome, Outcome) {
        // 两个连接互不相关，可以同时等待
        let (candidate, reference) = tokio::join!(
            self.candidate.execute(command.name(), command.args()),
            self.reference.execute(command.name(), command.args()),
        );
        debug!(%command, ?candidate, ?reference, "executed");

        (candidate, reference)
    }
}

async fn dial(addr: &str) -> Result<Client, SetupError> {
    Client::dial(addr).await.map_err(|source| SetupError::Dial {
        addr: addr.to_string(),
        source,
    })
}
