use anyhow::{Context, Result};
use tracing::{info, Subscriber};
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan, Layer};
use tracing_subscriber::{registry, EnvFilter};

/// Used when `RUST_LOG` is unset: the service and the instrumentation at
/// `info`, everything else (hyper, reqwest, ...) only when it warns.
pub const DEFAULT_DIRECTIVES: &str = "warn,phs=info,phs_core=info";

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// One short line per event, span fields folded in.
    Compact,
    /// Default `tracing` format with thread names.
    Full,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Compact
        } else {
            Self::Full
        }
    }
}

fn log_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_timer(SystemTime)
        .with_target(true);
    match format {
        LogFormat::Compact => Box::new(layer.compact()),
        LogFormat::Full => Box::new(layer.with_thread_names(true)),
    }
}

/// Filter built from `directives`, or [`DEFAULT_DIRECTIVES`] without any.
pub fn log_filter(directives: Option<&str>) -> Result<EnvFilter> {
    let directives = directives
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(DEFAULT_DIRECTIVES);
    EnvFilter::try_new(directives).with_context(|| format!("Invalid log filter {directives:?}"))
}

pub fn init_tracing(format: LogFormat) -> Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let subscriber = registry()
        .with(log_filter(directives.as_deref())?)
        .with(log_layer(format));
    tracing::subscriber::set_global_default(subscriber)?;
    info!(?format, "Logging initialized");
    Ok(())
}
