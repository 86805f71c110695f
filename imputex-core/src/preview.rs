//! Projection of imputation preview payloads into chart-ready series.

use serde::Serialize;
use tracing::warn;

use crate::types::{ImputationPreview, PreviewSeries};

/// Column label used when the payload does not name one.
const DEFAULT_COLUMN_NAME: &str = "Value";

/// One x-position of the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    /// Axis label: the time part of `timestamp` when it has one.
    pub label: String,
    pub timestamp: String,
    pub original: Option<f64>,
    /// `None` when the imputed series is shorter than the timestamps.
    pub imputed: Option<f64>,
    pub was_imputed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PreviewStats {
    pub total: usize,
    pub imputed: usize,
}

/// Chart data for the selected date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub selected_date: String,
    /// Every date the user can switch to.
    pub dates: Vec<String>,
    pub column_name: String,
    pub points: Vec<ChartPoint>,
    pub stats: PreviewStats,
}

impl ChartData {
    /// The observed series; `None` leaves a gap, never interpolated.
    pub fn original_series(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.original).collect()
    }

    /// Imputed values only where the original was missing, so they plot as
    /// isolated markers.
    pub fn imputed_overlay(&self) -> Vec<Option<f64>> {
        self.points
            .iter()
            .map(|p| p.imputed.filter(|_| p.was_imputed))
            .collect()
    }
}

/// What the preview area should show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartView {
    /// No preview yet, or the preview lists no dates.
    Empty,
    Chart(ChartData),
}

/// Build one point per timestamp. Vectors are index-aligned; a missing or
/// `null` original marks the point as imputed.
pub fn derive_points(series: &PreviewSeries) -> Vec<ChartPoint> {
    if series.imputed.len() < series.timestamps.len() {
        warn!(
            column = %series.column_name,
            timestamps = series.timestamps.len(),
            imputed = series.imputed.len(),
            "Imputed series shorter than timestamps"
        );
    }
    series
        .timestamps
        .iter()
        .enumerate()
        .map(|(i, timestamp)| {
            let original = series.original.get(i).copied().flatten();
            ChartPoint {
                label: time_label(timestamp).to_string(),
                timestamp: timestamp.clone(),
                original,
                imputed: series.imputed.get(i).copied(),
                was_imputed: original.is_none(),
            }
        })
        .collect()
}

pub fn stats(points: &[ChartPoint]) -> PreviewStats {
    PreviewStats {
        total: points.len(),
        imputed: points.iter().filter(|p| p.was_imputed).count(),
    }
}

fn time_label(timestamp: &str) -> &str {
    match timestamp.split_once(' ') {
        Some((_, time)) if !time.is_empty() => time,
        _ => timestamp,
    }
}

/// Keeps the selected preview date across snapshots.
#[derive(Debug, Clone, Default)]
pub struct PreviewProjector {
    selected: Option<String>,
}

impl PreviewProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected_date(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Remember the user's choice. It only sticks while the date stays in the preview.
    pub fn select(&mut self, date: impl Into<String>) {
        self.selected = Some(date.into());
    }

    pub fn reset(&mut self) {
        self.selected = None;
    }

    /// Settle the selection against `preview`, falling back to its first date.
    ///
    /// Returns `None` and leaves the selection untouched when the preview has no dates.
    pub fn resolve(&mut self, preview: &ImputationPreview) -> Option<&str> {
        let first = preview.dates_with_missing.first()?;
        let still_present = self
            .selected
            .as_ref()
            .is_some_and(|d| preview.dates_with_missing.contains(d));
        if !still_present {
            self.selected = Some(first.clone());
        }
        self.selected.as_deref()
    }

    pub fn project(&mut self, preview: Option<&ImputationPreview>) -> ChartView {
        let Some(preview) = preview else {
            return ChartView::Empty;
        };
        let Some(date) = self.resolve(preview).map(str::to_string) else {
            return ChartView::Empty;
        };
        let series = preview.preview_data.get(&date);
        let points = series.map(derive_points).unwrap_or_default();
        let column_name = series
            .map(|s| s.column_name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_COLUMN_NAME)
            .to_string();
        ChartView::Chart(ChartData {
            stats: stats(&points),
            selected_date: date,
            dates: preview.dates_with_missing.clone(),
            column_name,
            points,
        })
    }
}
