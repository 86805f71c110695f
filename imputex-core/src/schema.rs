//! Editable schema model built from the analyze response.
//!
//! A [`SchemaReview`] is what the user works on between upload and job start:
//! every column keeps its server-side profile and gains a user-selected type
//! and role.

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::types::{
    AnalyzeResponse, AnalyzedColumn, ColumnAction, ColumnConfig, ColumnRole, ColumnType,
};

/// Profile of one column plus the user's choices for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub detected_type: ColumnType,
    pub null_count: u64,
    pub null_ratio: f64,
    pub unique_count: u64,
    pub example: Vec<serde_json::Value>,
    pub recommended_action: ColumnAction,
    pub warnings: Vec<String>,
    pub selected_type: ColumnType,
    pub selected_role: ColumnRole,
}

impl ColumnProfile {
    pub fn has_missing(&self) -> bool {
        self.null_ratio > 0.0
    }
}

impl From<AnalyzedColumn> for ColumnProfile {
    fn from(col: AnalyzedColumn) -> Self {
        let selected_role = match col.recommended_action {
            ColumnAction::Impute => ColumnRole::Target,
            ColumnAction::Ignore => ColumnRole::Ignore,
        };
        Self {
            selected_type: col.detected_type,
            selected_role,
            name: col.name,
            detected_type: col.detected_type,
            null_count: col.null_count,
            null_ratio: col.null_ratio,
            unique_count: col.unique_count,
            example: col.example,
            recommended_action: col.recommended_action,
            warnings: col.warnings,
        }
    }
}

/// Which columns a listing should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnFilter {
    #[default]
    All,
    /// Only columns with a non-zero null ratio.
    Missing,
}

/// Number of columns per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleCounts {
    pub target: usize,
    pub feature: usize,
    pub ignore: usize,
}

/// The uploaded dataset's schema as currently edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaReview {
    pub job_id: String,
    pub filename: String,
    pub sample_rows: u64,
    pub total_null_ratio: f64,
    columns: Vec<ColumnProfile>,
}

impl From<AnalyzeResponse> for SchemaReview {
    fn from(response: AnalyzeResponse) -> Self {
        Self {
            job_id: response.job_id,
            filename: response.filename,
            sample_rows: response.sample_rows,
            total_null_ratio: response.total_null_ratio,
            columns: response.columns.into_iter().map(ColumnProfile::from).collect(),
        }
    }
}

impl SchemaReview {
    pub fn columns(&self) -> &[ColumnProfile] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut ColumnProfile, WorkflowError> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| WorkflowError::UnknownColumn {
                name: name.to_string(),
            })
    }

    pub fn set_type(&mut self, name: &str, column_type: ColumnType) -> Result<(), WorkflowError> {
        self.column_mut(name)?.selected_type = column_type;
        Ok(())
    }

    pub fn set_role(&mut self, name: &str, role: ColumnRole) -> Result<(), WorkflowError> {
        self.column_mut(name)?.selected_role = role;
        Ok(())
    }

    /// Advance a column to its next role and return the new role.
    pub fn cycle_role(&mut self, name: &str) -> Result<ColumnRole, WorkflowError> {
        let column = self.column_mut(name)?;
        column.selected_role = column.selected_role.next();
        Ok(column.selected_role)
    }

    /// Mark every column that has missing values as TARGET. Returns how many matched.
    pub fn mark_missing_as_targets(&mut self) -> usize {
        self.bulk_role(ColumnRole::Target, ColumnProfile::has_missing)
    }

    pub fn mark_all_as_features(&mut self) -> usize {
        self.bulk_role(ColumnRole::Feature, |_| true)
    }

    /// Ignore every column currently typed as ID.
    pub fn ignore_id_columns(&mut self) -> usize {
        self.bulk_role(ColumnRole::Ignore, |c| c.selected_type == ColumnType::Id)
    }

    fn bulk_role(&mut self, role: ColumnRole, predicate: impl Fn(&ColumnProfile) -> bool) -> usize {
        let mut changed = 0;
        for column in self.columns.iter_mut() {
            if predicate(column) {
                column.selected_role = role;
                changed += 1;
            }
        }
        changed
    }

    pub fn role_counts(&self) -> RoleCounts {
        self.columns
            .iter()
            .fold(RoleCounts::default(), |mut counts, c| {
                match c.selected_role {
                    ColumnRole::Target => counts.target += 1,
                    ColumnRole::Feature => counts.feature += 1,
                    ColumnRole::Ignore => counts.ignore += 1,
                }
                counts
            })
    }

    pub fn columns_with_warnings(&self) -> Vec<&ColumnProfile> {
        self.columns.iter().filter(|c| !c.warnings.is_empty()).collect()
    }

    /// Columns whose name contains `query` (case-insensitive) and that pass `filter`.
    pub fn filtered(&self, query: &str, filter: ColumnFilter) -> Vec<&ColumnProfile> {
        let needle = query.to_lowercase();
        self.columns
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&needle))
            .filter(|c| filter == ColumnFilter::All || c.has_missing())
            .collect()
    }

    /// The reduced `(name, type, role)` list sent at job start, in column order.
    pub fn column_config(&self) -> Vec<ColumnConfig> {
        self.columns
            .iter()
            .map(|c| ColumnConfig {
                name: c.name.clone(),
                column_type: c.selected_type,
                role: c.selected_role,
            })
            .collect()
    }
}
