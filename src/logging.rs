use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

fn parse_level(value: Option<String>) -> tracing::Level {
    match value
        .unwrap_or_else(|| "info".to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// 根据 `REDIS_PARITY_LOG` 初始化日志输出，可以重复调用，只有第一次生效
pub fn init() {
    INIT.get_or_init(|| {
        let level = parse_level(std::env::var("REDIS_PARITY_LOG").ok());
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels() {
        assert_eq!(parse_level(None), tracing::Level::INFO);
        assert_eq!(parse_level(Some("DEBUG".into())), tracing::Level::DEBUG);
        assert_eq!(parse_level(Some("bogus".into())), tracing::Level::INFO);
    }
}
