//! Task execution commands.

use std::path::Path;

use anyhow::Context;
use console::style;
use tokio::io::AsyncReadExt;

use attachd::models::{parse_job_submission, Task, TaskStatus};
use attachd::{Settings, TaskOrchestrator};

/// Run one task and print its JSON result.
pub async fn cmd_run(settings: Settings, id: &str, url: &str) -> anyhow::Result<()> {
    let orchestrator =
        TaskOrchestrator::from_settings(settings).context("failed to build HTTP clients")?;

    let result = orchestrator.run(&Task::new(id, url)).await;

    let marker = match result.status {
        TaskStatus::Success => style("✓").green(),
        TaskStatus::NoContent => style("-").yellow(),
        TaskStatus::Error => style("✗").red(),
    };
    eprintln!("{} {}", marker, result.summary_line());

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Run a job submission read from a file or stdin.
pub async fn cmd_batch(settings: Settings, file: Option<&Path>) -> anyhow::Result<()> {
    let text = match file {
        Some(path) if path != Path::new("-") => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("failed to read submission from stdin")?;
            text
        }
    };

    let tasks = parse_job_submission(&text)?;
    eprintln!(
        "{} {} task(s) accepted",
        style("→").dim(),
        style(tasks.len()).cyan()
    );

    let orchestrator =
        TaskOrchestrator::from_settings(settings).context("failed to build HTTP clients")?;
    let report = orchestrator.run_batch(&tasks).await;

    eprintln!("{}", report.report);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
