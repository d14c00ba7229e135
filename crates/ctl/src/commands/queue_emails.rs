//! `queue-emails`: statistics and recent items of the notification queue.

use colored::Colorize;

use taskmail_notifier::monitor::{CLI_LIST_LIMIT, QueueMonitor};

const EXCEPTION_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Stats,
    Pending,
    Failed,
}

/// `--stats` wins over `--failed`, which wins over `--pending`; no flag shows everything.
pub fn sections(failed: bool, pending: bool, stats: bool) -> Vec<Section> {
    if stats {
        vec![Section::Stats]
    } else if failed {
        vec![Section::Failed]
    } else if pending {
        vec![Section::Pending]
    } else {
        vec![Section::Stats, Section::Pending, Section::Failed]
    }
}

pub async fn run(monitor: &QueueMonitor, sections: &[Section]) -> anyhow::Result<()> {
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            println!();
        }
        match section {
            Section::Stats => show_stats(monitor).await?,
            Section::Pending => show_pending(monitor).await?,
            Section::Failed => show_failed(monitor).await?,
        }
    }
    Ok(())
}

async fn show_stats(monitor: &QueueMonitor) -> anyhow::Result<()> {
    println!("{}", "Email Queue Statistics".bold());
    println!();

    let stats = monitor.stats().await?;
    println!("{:<36} {:>8}", "Metric", "Count");
    println!("{:<36} {:>8}", "Pending Jobs (Total)", stats.pending_jobs);
    println!("{:<36} {:>8}", "Failed Jobs (Total)", stats.failed_jobs);
    println!(
        "{:<36} {:>8}",
        "Task Assignment Emails (Pending)", stats.email_jobs
    );
    println!(
        "{:<36} {:>8}",
        "Task Assignment Emails (Failed)", stats.failed_email_jobs
    );
    Ok(())
}

async fn show_pending(monitor: &QueueMonitor) -> anyhow::Result<()> {
    println!("{}", "Pending Email Jobs".bold());
    println!();

    let jobs = monitor.list_pending(CLI_LIST_LIMIT).await?;
    if jobs.is_empty() {
        println!("{}", "No pending email jobs found.".yellow());
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:>8}  {:<20}  {:<20}",
        "Job ID", "Queue", "Attempts", "Created At", "Available At"
    );
    for job in jobs {
        println!(
            "{:<36}  {:<10}  {:>8}  {:<20}  {:<20}",
            job.id,
            job.queue,
            job.attempts,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            job.available_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

async fn show_failed(monitor: &QueueMonitor) -> anyhow::Result<()> {
    println!("{}", "Failed Email Jobs".bold());
    println!();

    let jobs = monitor.list_failed(CLI_LIST_LIMIT).await?;
    if jobs.is_empty() {
        println!("No failed email jobs found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:<53}  {:<20}",
        "Job ID", "Queue", "Exception", "Failed At"
    );
    for job in jobs {
        println!(
            "{:<36}  {:<10}  {:<53}  {:<20}",
            job.id,
            job.queue,
            preview(&job.exception),
            job.failed_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

/// First 50 characters of an exception, always followed by an ellipsis.
fn preview(exception: &str) -> String {
    let head: String = exception.chars().take(EXCEPTION_PREVIEW_CHARS).collect();
    format!("{}...", head)
}
