//! Plain-text rendering of session views for the terminal.

use std::fmt::Write as _;

use watch_core::{JobStatus, ResultPayload, ViewState};

/// How many repositories the completed summary lists.
const TOP_REPOS: usize = 10;

/// One status line for a non-terminal view, full report for terminal ones.
pub fn render_view(view: &ViewState) -> String {
    match view {
        ViewState::Loading => "Loading job status...".to_string(),
        ViewState::Processing {
            elapsed,
            total_items,
            step,
        } => {
            let mut line = format!(
                "[{}/{}] {} ({}%) elapsed {}s",
                step.current,
                step.total,
                step.label(),
                step.percent(),
                elapsed.as_secs()
            );
            if let Some(total) = total_items {
                let _ = write!(line, ", {total} repositories");
            }
            line
        }
        ViewState::OfflineWaiting => {
            "Offline. Waiting for the connection to come back...".to_string()
        }
        ViewState::Failed(message) => format!("Failed: {message}"),
        ViewState::Completed(result) => render_result(result),
    }
}

pub fn render_result(result: &ResultPayload) -> String {
    let stats = &result.stats;
    let mut out = format!(
        "Classified {} repositories, {} stars total (avg {:.1})\n",
        stats.total_repos, stats.total_stars, stats.avg_stars
    );

    if !stats.categories.is_empty() {
        out.push_str("\nCategories:\n");
        for (name, count) in stats.categories_by_count() {
            let _ = writeln!(out, "  {name:<28} {count:>5}");
        }
    }

    if !result.repos.is_empty() {
        let mut repos: Vec<_> = result.repos.iter().collect();
        repos.sort_by(|a, b| b.stargazers_count.cmp(&a.stargazers_count));
        out.push_str("\nTop repositories:\n");
        for repo in repos.into_iter().take(TOP_REPOS) {
            let category = if repo.category.is_empty() {
                "-"
            } else {
                repo.category.as_str()
            };
            let _ = writeln!(
                out,
                "  {:<40} {:>7}  {category}",
                repo.full_name, repo.stargazers_count
            );
        }
    }
    out
}

/// One line per job, newest first as returned by the service.
pub fn render_history(jobs: &[JobStatus]) -> String {
    if jobs.is_empty() {
        return "No jobs.\n".to_string();
    }
    let mut out = String::new();
    for job in jobs {
        let _ = write!(
            out,
            "{}  {:<10}  {}",
            job.job_id,
            job.status.to_string(),
            job.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if let Some(total) = job.total_repos {
            let _ = write!(out, "  {total} repos");
        }
        if let Some(error) = &job.error {
            let _ = write!(out, "  ({error})");
        }
        out.push('\n');
    }
    out
}
