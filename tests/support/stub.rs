// 测试用的一个很小的RESP server，只支持少量命令
// 通过Quirks可以让它和正常的行为产生差异，用来验证harness能发现这些差异

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use redis_parity::{connection::Connection, frame::Frame};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{broadcast, Semaphore},
    time::{self, Duration},
};

// 最大连接数
const MAX_CONNECTIONS: usize = 64;

#[derive(Debug, Clone)]
pub struct Quirks {
    /// KEYS按倒序返回
    pub reverse_keys: bool,
    /// INCR每次增加多少
    pub incr_step: i64,
    /// 错误信息使用的错误码
    pub error_code: &'static str,
}

impl Default for Quirks {
    fn default() -> Self {
        Quirks {
            reverse_keys: false,
            incr_step: 1,
            error_code: "ERR",
        }
    }
}

/// 在127.0.0.1的随机端口上运行，drop的时候关闭
pub struct Stub {
    addr: String,
    notify_shutdown: broadcast::Sender<()>,
}

impl Stub {
    pub async fn start(quirks: Quirks) -> Stub {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (notify_shutdown, _) = broadcast::channel(1);

        let server = Listener {
            db: Db::default(),
            quirks,
            listener,
            limit_connections: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
            notify_shutdown: notify_shutdown.clone(),
        };

        tokio::spawn(async move {
            let mut shutdown = Shutdown::new(server.notify_shutdown.subscribe());
            tokio::select! {
                _ = server.run() => {}
                _ = shutdown.recv() => {}
            }
        });

        Stub {
            addr,
            notify_shutdown,
        }
    }

    pub async fn faithful() -> Stub {
        Stub::start(Quirks::default()).await
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Drop for Stub {
    fn drop(&mut self) {
        let _ = self.notify_shutdown.send(());
    }
}

#[derive(Debug, Clone, Default)]
struct Db {
    entries: Arc<Mutex<BTreeMap<Bytes, Bytes>>>,
}

struct Listener {
    db: Db,
    quirks: Quirks,
    listener: TcpListener,
    limit_connections: Arc<Semaphore>,
    notify_shutdown: broadcast::Sender<()>,
}

struct Handler {
    db: Db,
    quirks: Quirks,
    connection: Connection,
    shutdown: Shutdown,
}

// 监听服务器的关闭信号
struct Shutdown {
    is_shutdown: bool,
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    fn new(notify: broadcast::Receiver<()>) -> Self {
        Shutdown {
            is_shutdown: false,
            notify,
        }
    }

    async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }

        let _ = self.notify.recv().await;

        self.is_shutdown = true;
    }
}

impl Listener {
    async fn run(&self) -> redis_parity::Result<()> {
        loop {
            let permit = self.limit_connections.clone().acquire_owned().await?;
            let socket = self.accept().await?;

            let mut handler = Handler {
                db: self.db.clone(),
                quirks: self.quirks.clone(),
                connection: Connection::new(socket),
                shutdown: Shutdown::new(self.notify_shutdown.subscribe()),
            };

            tokio::spawn(async move {
                let _ = handler.run().await;
                drop(permit);
            });
        }
    }

    async fn accept(&self) -> redis_parity::Result<TcpStream> {
        let mut backoff = 1;
        loop {
            match self.listener.accept().await {
                Ok((socket, _)) => return Ok(socket),
                Err(e) => {
                    if backoff > 64 {
                        return Err(e.into());
                    }
                }
            }

            time::sleep(Duration::from_millis(backoff)).await;

            backoff *= 2;
        }
    }
}

impl Handler {
    async fn run(&mut self) -> redis_parity::Result<()> {
        while !self.shutdown.is_shutdown {
            let frame = tokio::select! {
                res = self.connection.read_frame() => res?,
                _ = self.shutdown.recv() => return Ok(()),
            };

            let frame = match frame {
                Some(frame) => frame,
                None => return Ok(()),
            };

            let (reply, close) = self.apply(arguments(frame)?);
            self.connection.write_frame(&reply).await?;
            if close {
                return Ok(());
            }
        }
        Ok(())
    }

    fn error(&self, msg: impl std::fmt::Display) -> Frame {
        Frame::Error(format!("{} {}", self.quirks.error_code, msg))
    }

    // 返回响应，以及是否需要关闭连接
    fn apply(&self, args: Vec<Bytes>) -> (Frame, bool) {
        let name = String::from_utf8_lossy(&args[0]).to_uppercase();
        let arity_ok = match &name[..] {
            "PING" | "RANDOMKEY" | "QUIT" => args.len() == 1,
            "ECHO" | "GET" | "INCR" | "KEYS" => args.len() == 2,
            "SET" => args.len() == 3,
            "DEL" | "EXISTS" => args.len() >= 2,
            _ => {
                let reply = self.error(format!("unknown command '{}'", String::from_utf8_lossy(&args[0])));
                return (reply, false);
            }
        };
        if !arity_ok {
            let reply = self.error(format!("wrong number of arguments for '{}' command", name.to_lowercase()));
            return (reply, false);
        }

        let mut entries = self.db.entries.lock().unwrap();
        let reply = match &name[..] {
            "PING" => Frame::Simple("PONG".into()),
            "QUIT" => return (Frame::Simple("OK".into()), true),
            "ECHO" => Frame::Bulk(args[1].clone()),
            "SET" => {
                entries.insert(args[1].clone(), args[2].clone());
                Frame::Simple("OK".into())
            }
            "GET" => entries.get(&args[1]).cloned().map(Frame::Bulk).unwrap_or(Frame::Null),
            "DEL" => Frame::Integer(args[1..].iter().filter(|k| entries.remove(*k).is_some()).count() as i64),
            "EXISTS" => Frame::Integer(args[1..].iter().filter(|k| entries.contains_key(*k)).count() as i64),
            "INCR" => {
                let current = match entries.get(&args[1]) {
                    Some(v) => match std::str::from_utf8(v).ok().and_then(|s| s.parse::<i64>().ok()) {
                        Some(n) => n,
                        None => return (self.error("value is not an integer or out of range"), false),
                    },
                    None => 0,
                };
                let next = current + self.quirks.incr_step;
                entries.insert(args[1].clone(), Bytes::from(next.to_string()));
                Frame::Integer(next)
            }
            "KEYS" => {
                let mut keys: Vec<Frame> = entries
                    .keys()
                    .filter(|k| glob(&args[1], k))
                    .map(|k| Frame::Bulk(k.clone()))
                    .collect();
                if self.quirks.reverse_keys {
                    keys.reverse();
                }
                Frame::Array(keys)
            }
            "RANDOMKEY" => entries.keys().next().cloned().map(Frame::Bulk).unwrap_or(Frame::Null),
            _ => unreachable!(),
        };
        (reply, false)
    }
}

fn arguments(frame: Frame) -> redis_parity::Result<Vec<Bytes>> {
    let parts = match frame {
        Frame::Array(parts) if !parts.is_empty() => parts,
        frame => return Err(format!("protocol error; expected array, got {:?}", frame).into()),
    };

    parts
        .into_iter()
        .map(|part| match part {
            Frame::Bulk(data) => Ok(data),
            Frame::Simple(s) => Ok(Bytes::from(s.into_bytes())),
            frame => Err(format!("protocol error; expected bulk, got {:?}", frame).into()),
        })
        .collect()
}

// 只支持 * 和 ?
fn glob(pattern: &[u8], s: &[u8]) -> bool {
    match (pattern.split_first(), s.split_first()) {
        (None, _) => s.is_empty(),
        (Some((&b'*', rest)), _) => glob(rest, s) || (!s.is_empty() && glob(pattern, &s[1..])),
        (Some((&b'?', rest)), Some((_, s_rest))) => glob(rest, s_rest),
        (Some((p, rest)), Some((c, s_rest))) => p == c && glob(rest, s_rest),
        (Some(_), None) => false,
    }
}
