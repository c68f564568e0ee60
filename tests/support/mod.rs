#![allow(dead_code)]

pub mod stub;

use std::{env, path::Path, sync::Arc};

use redis_parity::{
    dual::Dual, succ, test_auth_commands, test_commands, Collector, Command, Config, Target, Value,
};

/// 从环境变量读取配置，找不到redis-server时返回None，调用方直接跳过测试
pub fn redis_config() -> Option<Config> {
    let config = Config::from_env().expect("invalid REDIS_PARITY_* environment");

    let mut executables = vec![config.reference.executable.as_str()];
    if let Target::Spawn(candidate) = &config.candidate {
        executables.push(candidate);
    }

    for executable in executables {
        if !executable_exists(executable) {
            eprintln!("skipping: `{}` not found", executable);
            return None;
        }
    }

    redis_parity::logging::init();
    Some(config)
}

pub fn collector() -> Arc<Collector> {
    Arc::new(Collector::new())
}

/// 在新启动的reference和candidate上执行命令，要求两边完全一致
pub async fn parity(commands: &[Command]) {
    let config = match redis_config() {
        Some(config) => config,
        None => return,
    };

    let sink = collector();
    test_commands(&config, sink.clone(), commands)
        .await
        .expect("harness setup failed");
    sink.assert_clean();
}

pub async fn auth_parity(password: &str, commands: &[Command]) {
    let config = match redis_config() {
        Some(config) => config,
        None => return,
    };

    let sink = collector();
    test_auth_commands(&config, password, sink.clone(), commands)
        .await
        .expect("harness setup failed");
    sink.assert_clean();
}

/// 两个连接并发执行INCR，返回每个连接在 (candidate, reference) 上看到的值
pub async fn concurrent_incr(candidate: &str, reference: &str, streams: usize, n: usize) -> Vec<(Vec<i64>, Vec<i64>)> {
    let mut duals = Vec::with_capacity(streams);
    for _ in 0..streams {
        duals.push(Dual::dial(candidate, reference).await.unwrap());
    }

    let tasks: Vec<_> = duals
        .into_iter()
        .map(|mut dual| {
            tokio::spawn(async move {
                let (mut seen_c, mut seen_r) = (Vec::with_capacity(n), Vec::with_capacity(n));
                for _ in 0..n {
                    match dual.execute(&succ!("INCR", "counter")).await {
                        (Ok(Value::Int(c)), Ok(Value::Int(r))) => {
                            seen_c.push(c);
                            seen_r.push(r);
                        }
                        other => panic!("unexpected INCR reply: {:?}", other),
                    }
                }
                (seen_c, seen_r)
            })
        })
        .collect();

    let mut seen = Vec::with_capacity(streams);
    for task in tasks {
        seen.push(task.await.unwrap());
    }
    seen
}

pub fn strictly_increasing(values: &[i64]) -> bool {
    values.windows(2).all(|pair| pair[0] < pair[1])
}

fn executable_exists(name: &str) -> bool {
    let path = Path::new(name);
    if path.components().count() > 1 {
        return path.is_file();
    }

    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(name).is_file()))
        .unwrap_or(false)
}
