//! Glimpse console host.
//!
//! Reads one JSON evaluation request per line on stdin, evaluates it through
//! the engine on a dedicated UI thread, and writes one JSON report per line
//! on stdout. Results with a page or view are drawn on a console preview
//! surface on stderr.

mod config;
mod report;
mod surface;
mod widgets;

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use clap::Parser;
use glimpse_engine::{
    Dispatcher, EngineError, ErrorViewModel, EvaluationRequest, EvaluationResult, ModuleCatalog, Previewer,
    UiScheduler, UiThread,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::report::EvaluationReport;
use crate::surface::ConsoleSurface;

type SharedPreviewer = Arc<Mutex<Previewer<ConsoleSurface<std::io::Stderr>>>>;

/// Show the outcome of a request on the preview surface, on the UI thread.
fn present(scheduler: &UiScheduler, previewer: SharedPreviewer, outcome: &Result<EvaluationResult, EngineError>) {
    let outcome = outcome.clone();
    let shown = scheduler.invoke(
        move || {
            let mut previewer = previewer.lock().unwrap_or_else(PoisonError::into_inner);
            match &outcome {
                Ok(result) if !result.has_value() => {
                    if let Some(model) = ErrorViewModel::from_result(result) {
                        previewer.notify_error(model);
                    }
                }
                Ok(result) => {
                    previewer.preview(result);
                }
                Err(err) => previewer.notify_error(ErrorViewModel::from_engine_error(err)),
            }
        },
        &CancellationToken::new(),
        None,
    );
    if let Err(e) = shown {
        warn!(error = %e, "Failed to update preview");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Glimpse host");

    let options = config::load_options(&args)?;
    let (scheduler, ui) = UiThread::spawn().context("failed to start UI thread")?;

    let catalog = ModuleCatalog::new();
    catalog.load(widgets::module());
    let dispatcher = Arc::new(Dispatcher::new(scheduler.clone(), catalog, options));

    let previewer: Option<SharedPreviewer> = if args.no_preview {
        None
    } else {
        Some(Arc::new(Mutex::new(Previewer::new(
            ConsoleSurface::stderr(),
            widgets::view_models(),
        ))))
    };

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, cancelling pending requests");
                shutdown.cancel();
            }
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if shutdown.is_cancelled() {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let report = match serde_json::from_str::<EvaluationRequest>(&line) {
            Ok(request) => {
                let dispatcher = dispatcher.clone();
                let previewer = previewer.clone();
                let token = shutdown.child_token();
                let outcome = tokio::task::spawn_blocking(move || {
                    let outcome = dispatcher.evaluate(request, &token);
                    if let Some(previewer) = previewer {
                        present(dispatcher.scheduler(), previewer, &outcome);
                    }
                    outcome
                })
                .await
                .context("evaluation task failed")?;
                EvaluationReport::from_outcome(&outcome)
            }
            Err(e) => {
                warn!(error = %e, "Ignoring malformed request");
                EvaluationReport::failed(format!("malformed request: {}", e))
            }
        };

        let mut json = serde_json::to_string(&report)?;
        json.push('\n');
        stdout.write_all(json.as_bytes()).await?;
        stdout.flush().await?;
    }

    info!("Input closed, shutting down");

    // The UI loop stops once every scheduler handle is gone.
    drop(previewer);
    drop(dispatcher);
    drop(scheduler);
    tokio::task::spawn_blocking(move || ui.join())
        .await
        .context("UI thread join task failed")?
        .map_err(|_| anyhow::anyhow!("UI thread panicked"))?;

    Ok(())
}
