use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use redis_parity::{
    config::{DEFAULT_EXECUTABLE, DEFAULT_STREAM_BUFFER},
    logging, script, Collector, Config, ErrorRule, Harness, ServerConfig, Target,
};
use tracing::error;

#[derive(Parser, Debug)]
#[command(
    name = "parity",
    author,
    version,
    about = "Run command scripts against a reference redis-server and a candidate, and report every difference"
)]
struct Args {
    /// Script files, each one is a scenario run against fresh servers
    #[arg(required = true)]
    scripts: Vec<PathBuf>,

    /// Executable used for the reference server
    #[arg(long, env = "REDIS_PARITY_REFERENCE", default_value = DEFAULT_EXECUTABLE)]
    reference: String,

    /// Address of a running candidate, or an executable to spawn one (defaults to the reference executable)
    #[arg(long, env = "REDIS_PARITY_CANDIDATE")]
    candidate: Option<String>,

    /// Require this password on the spawned servers
    #[arg(long)]
    password: Option<String>,

    /// How errors are compared: kind, prefix or message
    #[arg(long, env = "REDIS_PARITY_ERROR_RULE", default_value_t = ErrorRule::Kind)]
    error_rule: ErrorRule,

    /// How long to wait for a spawned server to accept connections
    #[arg(long, env = "REDIS_PARITY_READY_TIMEOUT_MS", default_value_t = 1000)]
    ready_timeout_ms: u64,
}

impl Args {
    fn config(&self) -> Config {
        let candidate = match &self.candidate {
            Some(target) => Target::parse(target),
            None => Target::Spawn(self.reference.clone()),
        };

        Config {
            reference: ServerConfig {
                executable: self.reference.clone(),
                ready_timeout: Duration::from_millis(self.ready_timeout_ms),
                ..ServerConfig::default()
            },
            candidate,
            error_rule: self.error_rule,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let args = Args::parse();
    let config = args.config();

    let mut divergent = false;
    for path in &args.scripts {
        match run_script(&config, args.password.as_deref(), path).await {
            Ok(0) => println!("{}: ok", path.display()),
            Ok(n) => {
                println!("{}: {} divergence(s)", path.display(), n);
                divergent = true;
            }
            Err(err) => {
                error!("{}: {:#}", path.display(), err);
                return ExitCode::from(2);
            }
        }
    }

    if divergent {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run_script(
    config: &Config,
    password: Option<&str>,
    path: &Path,
) -> anyhow::Result<usize> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let commands = script::parse(&source)?;

    let sink = Arc::new(Collector::new());
    let harness = match password {
        Some(password) => Harness::start_with_auth(config, password, sink.clone()).await?,
        None => Harness::start(config, sink.clone()).await?,
    };
    let result = harness.run(&commands).await;
    harness.close().await;
    result?;

    for divergence in sink.divergences() {
        println!("  {}", divergence);
    }
    Ok(sink.len())
}
