use std::{env, net::SocketAddr, time::Duration};

use crate::judge::ErrorRule;

/// 默认使用的redis可执行文件
pub const DEFAULT_EXECUTABLE: &str = "redis-server";

pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(1);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

// 并发场景中每个stream的生产者最多提前生成多少条命令
pub const DEFAULT_STREAM_BUFFER: usize = 1;

/// 临时server的启动配置
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub executable: String,
    /// 不落盘，每次启动都是空的数据库
    pub in_memory: bool,
    pub password: Option<String>,
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            executable: DEFAULT_EXECUTABLE.to_string(),
            in_memory: true,
            password: None,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// 被测试的server从哪里来
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// 已经在运行的server
    Address(String),
    /// 和reference一样，用这个可执行文件启动一个临时的server
    Spawn(String),
}

impl Target {
    /// 能解析成socket地址的当作已经运行的server，否则当作可执行文件
    pub fn parse(s: &str) -> Target {
        if s.parse::<SocketAddr>().is_ok() {
            Target::Address(s.to_string())
        } else {
            Target::Spawn(s.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub reference: ServerConfig,
    pub candidate: Target,
    pub error_rule: ErrorRule,
    pub stream_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            reference: ServerConfig::default(),
            candidate: Target::Spawn(DEFAULT_EXECUTABLE.to_string()),
            error_rule: ErrorRule::default(),
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }
}

impl Config {
    /// 从环境变量读取配置：
    ///
    /// * `REDIS_PARITY_REFERENCE`: reference使用的可执行文件
    /// * `REDIS_PARITY_CANDIDATE`: 被测试server的地址，或者用来启动它的可执行文件，默认和reference相同
    /// * `REDIS_PARITY_READY_TIMEOUT_MS`: 等待server启动的超时时间
    /// * `REDIS_PARITY_ERROR_RULE`: `kind`、`prefix` 或 `message`
    pub fn from_env() -> crate::Result<Config> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> crate::Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(executable) = lookup("REDIS_PARITY_REFERENCE") {
            config.reference.executable = executable;
        }

        config.candidate = match lookup("REDIS_PARITY_CANDIDATE") {
            Some(target) => Target::parse(&target),
            None => Target::Spawn(config.reference.executable.clone()),
        };

        if let Some(ms) = lookup("REDIS_PARITY_READY_TIMEOUT_MS") {
            let ms = ms
                .parse::<u64>()
                .map_err(|_| format!("REDIS_PARITY_READY_TIMEOUT_MS: invalid number `{}`", ms))?;
            config.reference.ready_timeout = Duration::from_millis(ms);
        }

        if let Some(rule) = lookup("REDIS_PARITY_ERROR_RULE") {
            config.error_rule = rule.parse()?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_spawn_both_sides() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.candidate, Target::Spawn("redis-server".into()));
        assert_eq!(config.reference.ready_timeout, Duration::from_secs(1));
    }

    #[test]
    fn candidate_defaults_to_reference_executable() {
        let config = Config::from_lookup(lookup(&[("REDIS_PARITY_REFERENCE", "/opt/redis/bin/redis-server")])).unwrap();
        assert_eq!(config.candidate, Target::Spawn("/opt/redis/bin/redis-server".into()));
    }

    #[test]
    fn candidate_address() {
        let config = Config::from_lookup(lookup(&[
            ("REDIS_PARITY_CANDIDATE", "127.0.0.1:6380"),
            ("REDIS_PARITY_READY_TIMEOUT_MS", "2500"),
            ("REDIS_PARITY_ERROR_RULE", "prefix"),
        ]))
        .unwrap();
        assert_eq!(config.candidate, Target::Address("127.0.0.1:6380".into()));
        assert_eq!(config.reference.ready_timeout, Duration::from_millis(2500));
        assert_eq!(config.error_rule, ErrorRule::Prefix);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[("REDIS_PARITY_READY_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("REDIS_PARITY_READY_TIMEOUT_MS"));
        assert!(Config::from_lookup(lookup(&[("REDIS_PARITY_ERROR_RULE", "fuzzy")])).is_err());
    }
}
