mod cli;
mod config;
mod logging;
mod probe;
mod render;

use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use watch_core::{JobId, ViewState};
use watch_engine::{
    watch_job, ApiClient, ClassifyRequest, ConnectivityMonitor, HttpJobApi, JobApi, SessionEvent,
};
use watch_logging::{parse_level, watch_info, watch_warn};

use crate::cli::{Cli, Command};
use crate::config::AppConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let level = match cli.log_level.as_deref() {
        Some(name) => parse_level(name).with_context(|| format!("unknown log level {name:?}"))?,
        None => config.level()?,
    };
    logging::initialize(config.log_destination, level);
    if config.api_url_from_env {
        watch_info!("Using API URL {} from {}", config.api_url, crate::config::API_URL_ENV);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let outcome = runtime.block_on(run(cli.command, config));
    // A pending stdin read would otherwise hold the runtime open.
    runtime.shutdown_background();
    outcome
}

async fn run(command: Command, config: AppConfig) -> anyhow::Result<()> {
    let client = ApiClient::new(&config.api_settings())
        .with_context(|| format!("invalid API URL {:?}", config.api_url))?;
    let api = HttpJobApi::new(client, &config.watch_settings());

    match command {
        Command::Classify {
            token,
            min_stars,
            include_forks,
            include_archived,
            detach,
        } => {
            let mut request = ClassifyRequest::new(token);
            request.min_stars = min_stars;
            request.exclude_forks = !include_forks;
            request.include_archived = include_archived;
            let job_id = api
                .submit_job(&request)
                .await
                .context("submitting classification job")?;
            println!("Submitted job {job_id}");
            if detach {
                return Ok(());
            }
            watch(api, &config, job_id).await
        }
        Command::Watch { job_id } => watch(api, &config, JobId::new(job_id)).await,
        Command::History => {
            let jobs = api.list_jobs().await.context("listing jobs")?;
            print!("{}", render::render_history(&jobs));
            Ok(())
        }
        Command::Delete { job_id } => {
            let job_id = JobId::new(job_id);
            let message = api
                .delete_job(&job_id)
                .await
                .with_context(|| format!("deleting job {job_id}"))?;
            println!("{message}");
            Ok(())
        }
        Command::Health => {
            let health = api.health().await.context("checking service health")?;
            println!("{}", health.status);
            if !health.is_healthy() {
                bail!("service reports {:?}", health.status);
            }
            Ok(())
        }
    }
}

/// Drives one watch session on the terminal.
///
/// Typing `r` retries after a failure; Ctrl-C stops watching.
async fn watch(api: HttpJobApi, config: &AppConfig, job_id: JobId) -> anyhow::Result<()> {
    let monitor = ConnectivityMonitor::new(true);
    let base = api.client().base_url();
    let probe = match (base.host_str(), base.port_or_known_default()) {
        (Some(host), Some(port)) => Some(probe::spawn_probe(
            monitor.clone(),
            host.to_string(),
            port,
            config.probe_interval(),
        )),
        _ => {
            watch_warn!("No host to probe in {base}; assuming always online");
            None
        }
    };

    let api: Arc<dyn JobApi> = Arc::new(api);
    let mut handle = watch_job(api, &monitor, job_id, config.watch_settings());
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_line = String::new();
    let mut last_view = ViewState::Loading;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                watch_info!("Interrupted; stopping watch of {}", handle.job_id());
                handle.cancel();
                break;
            }
            line = input.next_line(), if input_open => match line {
                Ok(Some(line)) if line.trim().eq_ignore_ascii_case("r") => handle.retry(),
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => input_open = false,
            },
            event = handle.next_event() => match event {
                Some(SessionEvent::Updated(state)) => {
                    last_view = state.view(Utc::now());
                    let line = render::render_view(&last_view);
                    if line != last_line {
                        println!("{line}");
                        last_line = line;
                    }
                    if matches!(last_view, ViewState::Failed(_)) {
                        if !input_open {
                            break;
                        }
                        println!("Type r and press Enter to retry, or Ctrl-C to quit.");
                    }
                }
                Some(SessionEvent::Notice(notice)) => eprintln!("{notice}"),
                None => break,
            },
        }
    }

    if let Some(probe) = probe {
        probe.abort();
    }
    handle.cancel();
    handle.join().await;

    match last_view {
        ViewState::Failed(message) => bail!("job failed: {message}"),
        _ => Ok(()),
    }
}
