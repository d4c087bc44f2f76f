use crate::model::{ProjectPipeline, Tab};
use crate::state::{FilterOptions, FilterState};

use super::{apply_filters, group_by_status, ViewKind};

/// Latest default-branch pipeline per project, split into status tabs.
#[derive(Debug, Default)]
pub struct LatestPipelinesView {
    snapshot: Vec<ProjectPipeline>,
    filters: FilterState,
    loading: bool,
    options: FilterOptions,
    filtered: Vec<ProjectPipeline>,
    tabs: Vec<Tab<ProjectPipeline>>,
}

impl LatestPipelinesView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the fetched records wholesale.
    pub fn set_snapshot(&mut self, snapshot: Vec<ProjectPipeline>) {
        self.snapshot = snapshot;
        self.options = FilterOptions::collect(&self.snapshot, ViewKind::Latest);
        self.recompute();
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn edit_filters(&mut self, edit: impl FnOnce(&mut FilterState)) {
        edit(&mut self.filters);
        self.recompute();
    }

    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    /// Filtered records, including projects that have no pipeline.
    pub fn filtered(&self) -> &[ProjectPipeline] {
        &self.filtered
    }

    pub fn tabs(&self) -> &[Tab<ProjectPipeline>] {
        &self.tabs
    }

    fn recompute(&mut self) {
        self.filtered = apply_filters(&self.snapshot, &self.filters, ViewKind::Latest);
        self.tabs = group_by_status(self.filtered.clone());
    }
}
