use clap::Parser;
use phs::app_state::AppState;
use phs::http::{setup_http_server, setup_metrics_server};
use phs::init_telemetry::{init_tracing, LogFormat};
use phs::settings::config::Settings;
use phs::stop_flag;
use tokio::time::sleep;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "phs")]
#[command(about = "Demo service for configurable HTTP request metrics")]
#[clap(version)]
struct Cli {
    /// Port of the API server, overrides api.bind_address
    #[arg(long, env = "PHS_PORT")]
    port: Option<u16>,

    /// Log line format, compact in debug builds and full otherwise
    #[arg(long, env = "PHS_LOG_FORMAT", value_enum, default_value_t)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Parser)]
enum Commands {
    /// Show current configuration and exit
    Config,
    /// Start the phs server (default)
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Variables already in the environment win over both files.
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Some(Commands::Config) = cli.command {
        let settings = Settings::new()?;
        println!("{:#?}", settings);
        return Ok(());
    }

    init_tracing(cli.log_format)?;

    let mut settings = Settings::new()?;
    if let Some(port) = cli.port {
        settings = settings.with_port(port);
    }

    let stop_flag = stop_flag::StopFlag::new();
    stop_flag::register_signal_handler(&stop_flag);
    let app_state = AppState::from_settings(settings, stop_flag)?;

    let mut handles = vec![
        setup_metrics_server(
            app_state.clone(),
            &app_state.settings.exporter.bind_address,
        )
        .await?,
        setup_http_server(app_state.clone(), &app_state.settings.api.bind_address).await?,
    ];

    sleep(std::time::Duration::from_millis(100)).await;

    loop {
        let (finished, running): (Vec<_>, Vec<_>) =
            handles.into_iter().partition(|handle| handle.is_finished());
        handles = running;

        for handle in finished {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                // Take the other listener down as well.
                error!("Server failed: {:#}", e);
                app_state.stop_flag.stop();
            }
        }

        if handles.is_empty() {
            info!("All servers are down");
            break;
        }

        sleep(std::time::Duration::from_millis(200)).await;
    }

    Ok(())
}
