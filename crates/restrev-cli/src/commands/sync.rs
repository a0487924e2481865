use std::time::Duration;

use restrev_core::DrainReport;

use crate::commands::common::{format_drain_report, format_queue_lines, now_ms, QueueItem, Service};
use crate::error::CliError;

pub async fn run_queue(service: &Service, as_json: bool) -> Result<(), CliError> {
    let now = now_ms();
    let items = service
        .pending_mutations()
        .await?
        .iter()
        .map(|mutation| QueueItem::new(mutation, now))
        .collect::<Vec<_>>();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("Nothing waiting to be sent.");
        return Ok(());
    }

    for line in format_queue_lines(&items) {
        println!("{line}");
    }
    Ok(())
}

/// Drain the offline queue once, or every `watch` seconds until interrupted
pub async fn run_sync(service: &Service, watch: Option<u64>) -> Result<(), CliError> {
    let Some(interval) = watch.filter(|secs| *secs > 0) else {
        let report = sync_once(service).await?;
        if report.failed > 0 {
            return Err(CliError::SyncIncomplete(report.remaining));
        }
        return Ok(());
    };

    let interval = Duration::from_secs(interval);
    loop {
        if let Err(error) = sync_once(service).await {
            tracing::warn!("Sync pass failed: {error}");
        }

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                return Ok(());
            }
        }
    }
}

async fn sync_once(service: &Service) -> Result<DrainReport, CliError> {
    let report = service.sync().await?;
    println!("{}", format_drain_report(&report));
    Ok(report)
}
