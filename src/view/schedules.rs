use crate::model::ScheduleProjectPipeline;
use crate::state::{FilterOptions, FilterState};

use super::{apply_filters, ViewKind};

/// Pipeline schedules with the last pipeline each one produced.
#[derive(Debug, Default)]
pub struct SchedulesView {
    snapshot: Vec<ScheduleProjectPipeline>,
    filters: FilterState,
    loading: bool,
    options: FilterOptions,
    displayed: Vec<ScheduleProjectPipeline>,
}

impl SchedulesView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the fetched records wholesale.
    pub fn set_snapshot(&mut self, snapshot: Vec<ScheduleProjectPipeline>) {
        self.snapshot = snapshot;
        self.options = FilterOptions::collect(&self.snapshot, ViewKind::Schedules);
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

    pub fn displayed(&self) -> &[ScheduleProjectPipeline] {
        &self.displayed
    }

    fn recompute(&mut self) {
        self.displayed = apply_filters(&self.snapshot, &self.filters, ViewKind::Schedules);
    }
}
