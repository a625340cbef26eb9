use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Filter directives in this variable replace `--log-level`, e.g.
/// `BUSLINK_LOG=warn,buslink_transport=trace` to watch one crate's traffic.
pub const LOG_ENV: &str = "BUSLINK_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn filter(level: LogLevel, env: Option<&str>) -> EnvFilter {
    match env.map(str::trim) {
        Some(spec) if !spec.is_empty() => EnvFilter::try_new(spec).unwrap_or_else(|err| {
            eprintln!("ignoring {LOG_ENV}={spec:?}: {err}");
            EnvFilter::new(level.directive())
        }),
        _ => EnvFilter::new(level.directive()),
    }
}

/// Install the stderr subscriber. Per-message traffic is at debug/trace;
/// thread names tell interface threads apart.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let env = std::env::var(LOG_ENV).ok();
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter(level, env.as_deref()))
        .with_ansi(false)
        .with_thread_names(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
