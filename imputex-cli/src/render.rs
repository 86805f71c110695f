//! Plain-text rendering of schema, progress and preview data.

use imputex_core::preview::ChartView;
use imputex_core::progress::{JobView, StageState, clamp_progress, format_eta, stage_index};
use imputex_core::schema::SchemaReview;
use imputex_core::types::JobStatusResponse;
use std::fmt::Write;

const BAR_WIDTH: usize = 30;

/// Column table with detected type, user choices and null statistics.
pub fn schema_table(schema: &SchemaReview) -> String {
    let name_width = schema
        .columns()
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0)
        .max("COLUMN".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({} rows sampled, {:.1}% missing overall)",
        schema.filename,
        schema.sample_rows,
        schema.total_null_ratio * 100.0
    );
    let _ = writeln!(
        out,
        "  {:<name_width$}  {:<11}  {:<11}  {:<7}  {:>8}  {:>6}",
        "COLUMN", "DETECTED", "TYPE", "ROLE", "NULLS", "NULL%"
    );
    for c in schema.columns() {
        let _ = writeln!(
            out,
            "  {:<name_width$}  {:<11}  {:<11}  {:<7}  {:>8}  {:>5.1}%",
            c.name,
            c.detected_type.to_string(),
            c.selected_type.to_string(),
            c.selected_role.to_string(),
            c.null_count,
            c.null_ratio * 100.0
        );
    }
    for c in schema.columns_with_warnings() {
        for warning in &c.warnings {
            let _ = writeln!(out, "  ! {}: {}", c.name, warning);
        }
    }
    out
}

pub fn role_summary(schema: &SchemaReview) -> String {
    let counts = schema.role_counts();
    format!(
        "{} target, {} feature, {} ignored",
        counts.target, counts.feature, counts.ignore
    )
}

fn bar(progress: u8) -> String {
    let filled = usize::from(progress) * BAR_WIDTH / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn stage_label(job: &JobView) -> &'static str {
    job.stages()
        .into_iter()
        .find(|(_, state)| *state == StageState::Active)
        .map(|(label, _)| label)
        .unwrap_or(if job.stage < 0 { "Failed" } else { "Done" })
}

/// One-line progress summary, e.g. `[###---] 45% Impute ~4 min`.
pub fn progress_line(job: &JobView) -> String {
    format!(
        "{} {:>3}% {:<10} {}",
        bar(job.progress),
        job.progress,
        stage_label(job),
        job.eta
    )
}

pub fn stages(job: &JobView) -> String {
    job.stages()
        .into_iter()
        .map(|(label, state)| match state {
            StageState::Done => format!("[x] {label}"),
            StageState::Active => format!("[>] {label}"),
            StageState::Pending => format!("[ ] {label}"),
        })
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn column_progress(job: &JobView) -> String {
    let mut out = String::new();
    for c in &job.columns {
        let _ = writeln!(
            out,
            "  {}: {} missing of {} rows, {}% filled",
            c.name, c.missing_count, c.total_count, c.fill_progress
        );
    }
    out
}

pub fn log_tail(job: &JobView, n: usize) -> String {
    job.log_tail(n)
        .iter()
        .map(|line| format!("  | {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summary of the charted date, with imputed points marked `*`.
pub fn chart(view: &ChartView) -> String {
    let data = match view {
        ChartView::Empty => return "No imputation preview available.".to_string(),
        ChartView::Chart(data) => data,
    };
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} on {} ({} of {} points imputed)",
        data.column_name, data.selected_date, data.stats.imputed, data.stats.total
    );
    if data.dates.len() > 1 {
        let _ = writeln!(out, "  other dates: {}", data.dates.join(", "));
    }
    for p in &data.points {
        match p.original {
            Some(v) => {
                let _ = writeln!(out, "  {:>8}  {:>12.4}", p.label, v);
            }
            None => match p.imputed {
                Some(v) => {
                    let _ = writeln!(out, "  {:>8}  {:>12.4} *", p.label, v);
                }
                None => {
                    let _ = writeln!(out, "  {:>8}  {:>12} *", p.label, "-");
                }
            },
        }
    }
    out
}

/// Human-readable view of a raw status snapshot.
pub fn job_status(status: &JobStatusResponse) -> String {
    let progress = clamp_progress(status.progress);
    let mut out = format!(
        "{} {} {}% ({}, stage {}) {}",
        status.job_id,
        status.status,
        progress,
        if status.stage.is_empty() { "-" } else { status.stage.as_str() },
        stage_index(&status.stage),
        format_eta(progress)
    );
    if let Some(message) = &status.error_message {
        let _ = write!(out, "\n  error: {message}");
    }
    if let Some(url) = &status.download_url {
        let _ = write!(out, "\n  result: {url}");
    }
    out
}
