use std::{io, process::ExitStatus, time::Duration};

/// 测试环境本身的问题，出现之后当前场景直接终止
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to find a free port on 127.0.0.1: {0}")]
    Port(#[source] io::Error),

    #[error("failed to spawn `{executable}`: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to write configuration to `{executable}`: {source}")]
    Configure {
        executable: String,
        #[source]
        source: io::Error,
    },

    #[error("`{executable}` exited before accepting connections ({status})")]
    Exited { executable: String, status: ExitStatus },

    #[error("no connection on {addr} after {timeout:?}")]
    NotReady { addr: String, timeout: Duration },

    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },
}
