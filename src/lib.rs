// 用同样的命令序列同时驱动两个redis实现（reference和candidate），比较它们的响应是否一致
// * 'frame' 'connection' 'client': RESP协议的编解码，以及发送命令的客户端
// * 'ephemeral': 在随机端口上启动一个临时的redis-server
// * 'command': 一条命令以及期望的结果和比较方式
// * 'judge': 比较两边的结果，'sink' 记录不一致
// * 'runner' 'harness': 按顺序或者并发执行场景
pub mod client;
pub mod command;
pub mod config;
pub mod connection;
pub mod dual;
pub mod ephemeral;
pub mod error;
pub mod frame;
pub mod harness;
pub mod judge;
pub mod logging;
pub mod runner;
pub mod script;
pub mod sink;
pub mod value;

pub use command::{Command, Policy};
pub use config::{Config, ServerConfig, Target};
pub use error::SetupError;
pub use harness::{test_auth_commands, test_commands, test_multi_commands, Harness};
pub use judge::{Divergence, DivergenceKind, ErrorRule, Judge, Side};
pub use runner::{stream, stream_iter, Producer, Stream};
pub use sink::{Collector, FailureSink};
pub use value::{Arg, Outcome, OutcomeError, Value};

pub type Error = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;
