//! 在随机端口上启动一个只在内存中运行的redis，用完之后杀掉

use std::{net::TcpListener, process::Stdio, time::Duration};

use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    process::{Child, Command},
    time::{self, Instant},
};
use tracing::{debug, info, warn};

use crate::{config::ServerConfig, error::SetupError};

pub const LOCALHOST: &str = "127.0.0.1";

// 杀掉进程之后最多等待多久让它退出
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// 一个临时的server进程，drop的时候会被杀掉并回收
#[derive(Debug)]
pub struct Ephemeral {
    executable: String,
    addr: String,
    child: Option<Child>,
}

impl Ephemeral {
    /// 启动server并等待它可以接受连接，返回之前至少成功建立过一次连接
    pub async fn start(config: &ServerConfig) -> Result<Ephemeral, SetupError> {
        let port = free_port()?;
        let addr = format!("{}:{}", LOCALHOST, port);

        // 配置通过stdin传给server，避免密码出现在进程列表里
        let child = Command::new(&config.executable)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SetupError::Spawn {
                executable: config.executable.clone(),
                source,
            })?;

        // 从这里开始，任何错误返回时server都会在drop中被杀掉
        let mut server = Ephemeral {
            executable: config.executable.clone(),
            addr,
            child: Some(child),
        };
        info!(executable = %server.executable, addr = %server.addr, "spawned server");

        server.configure(&render_config(port, config)).await?;
        server.wait_ready(config).await?;

        info!(addr = %server.addr, "server is ready");
        Ok(server)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// 杀掉server并等待它退出，进程已经退出时也可以调用
    pub async fn close(mut self) {
        let mut child = match self.child.take() {
            Some(child) => child,
            None => return,
        };

        // 进程已经退出的话kill会失败，忽略即可
        if let Err(err) = child.start_kill() {
            debug!(addr = %self.addr, %err, "kill failed");
        }

        match time::timeout(REAP_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => info!(addr = %self.addr, %status, "server stopped"),
            Ok(Err(err)) => warn!(addr = %self.addr, %err, "failed to reap server"),
            Err(_) => warn!(addr = %self.addr, "server did not exit after kill"),
        }
    }

    async fn configure(&mut self, config: &str) -> Result<(), SetupError> {
        let stdin = self.child.as_mut().and_then(|child| child.stdin.take());
        if let Some(mut stdin) = stdin {
            // stdin在这里被drop，server读到EOF之后开始启动
            stdin
                .write_all(config.as_bytes())
                .await
                .map_err(|source| SetupError::Configure {
                    executable: self.executable.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    async fn wait_ready(&mut self, config: &ServerConfig) -> Result<(), SetupError> {
        let executable = self.executable.clone();
        let child = &mut self.child;
        let addr = self.addr.clone();

        poll_ready(&addr, config.poll_interval, config.ready_timeout, || {
            match child.as_mut().map(|child| child.try_wait()) {
                Some(Ok(Some(status))) => Err(SetupError::Exited {
                    executable: executable.clone(),
                    status,
                }),
                _ => Ok(()),
            }
        })
        .await
    }
}

// 没有调用close的时候（比如测试panic），只发送kill，剩下的回收交给tokio
impl Drop for Ephemeral {
    fn drop(&mut self) {
        let mut child = match self.child.take() {
            Some(child) => child,
            None => return,
        };

        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        if let Err(err) = child.start_kill() {
            debug!(addr = %self.addr, %err, "kill failed");
        }
    }
}

/// 找一个没有被使用的端口：先在0端口上监听，拿到系统分配的端口后立即释放
pub fn free_port() -> Result<u16, SetupError> {
    let listener = TcpListener::bind((LOCALHOST, 0)).map_err(SetupError::Port)?;
    let port = listener.local_addr().map_err(SetupError::Port)?.port();
    Ok(port)
}

/// 不断尝试连接addr，直到连接成功或者超时
pub async fn wait_ready(addr: &str, interval: Duration, timeout: Duration) -> Result<(), SetupError> {
    poll_ready(addr, interval, timeout, || Ok(())).await
}

// alive在每次连接失败之后调用，返回错误时立即停止等待
async fn poll_ready<F>(
    addr: &str,
    interval: Duration,
    timeout: Duration,
    mut alive: F,
) -> Result<(), SetupError>
where
    F: FnMut() -> Result<(), SetupError>,
{
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Ok(Ok(_conn)) = time::timeout_at(deadline, TcpStream::connect(addr)).await {
            debug!(addr, attempts, "connected");
            return Ok(());
        }

        alive()?;

        if Instant::now() >= deadline {
            return Err(SetupError::NotReady {
                addr: addr.to_string(),
                timeout,
            });
        }

        time::sleep(interval).await;
    }
}

// redis的配置文件格式，每行一个配置项
fn render_config(port: u16, config: &ServerConfig) -> String {
    let mut out = format!("port {}\nbind {}\n", port, LOCALHOST);
    if config.in_memory {
        out.push_str("save \"\"\nappendonly no\n");
    }
    if let Some(password) = &config.password {
        out.push_str(&format!("requirepass \"{}\"\n", escape(password)));
    }
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
