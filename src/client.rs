use bytes::Bytes;
use tokio::net::TcpStream;
use tracing::debug;

use crate::{
    connection::Connection,
    frame::Frame,
    value::{outcome_from_frame, Arg, Outcome, OutcomeError},
};

// 一个到server的连接，按顺序发送命令并读取响应
// 连接出错之后不会重连，后续命令都返回连接错误
#[derive(Debug)]
pub struct Client {
    addr: String,
    connection: Option<Connection>,
}

impl Client {
    pub async fn dial(addr: &str) -> std::io::Result<Client> {
        let socket = TcpStream::connect(addr).await?;
        socket.set_nodelay(true)?;

        Ok(Client {
            addr: addr.to_string(),
            connection: Some(Connection::new(socket)),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// 执行一条命令，连接上的任何错误都作为执行结果返回，而不是中断调用方
    pub async fn execute(&mut self, name: &str, args: &[Arg]) -> Outcome {
        let connection = match self.connection.as_mut() {
            Some(connection) => connection,
            None => return Err(OutcomeError::Connection("connection closed".into())),
        };

        let mut parts = Vec::with_capacity(args.len() + 1);
        parts.push(Frame::Bulk(Bytes::copy_from_slice(name.as_bytes())));
        parts.extend(args.iter().map(|arg| Frame::Bulk(arg.to_bytes())));

        let reply = match connection.write_frame(&Frame::Array(parts)).await {
            Ok(()) => connection.read_frame().await,
            Err(err) => Err(err),
        };

        match reply {
            Ok(Some(frame)) => outcome_from_frame(frame),
            Ok(None) => {
                debug!(addr = %self.addr, command = name, "server closed the connection");
                self.connection = None;
                Err(OutcomeError::Connection("connection closed by server".into()))
            }
            Err(err) => {
                debug!(addr = %self.addr, command = name, %err, "connection failed");
                self.connection = None;
                Err(OutcomeError::Connection(err.to_string()))
            }
        }
    }
}
