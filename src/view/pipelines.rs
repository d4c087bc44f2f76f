use crate::model::{PipelineId, ProjectPipeline, ProjectPipelines};
use crate::pins::PinStore;
use crate::state::{FilterOptions, FilterState};

use super::{apply_filters, sort_by_recency, sort_pinned_first, ViewKind};

/// Recent pipelines of every project, newest first with pinned ones on top.
pub struct PipelinesView {
    snapshot: Vec<ProjectPipelines>,
    filters: FilterState,
    loading: bool,
    pins: PinStore,
    pinned: Vec<PipelineId>,
    options: FilterOptions,
    displayed: Vec<ProjectPipeline>,
}

impl PipelinesView {
    /// Creates the view with the pins saved earlier in this session.
    pub fn new(pins: PinStore) -> Self {
        let pinned = pins.load();
        Self {
            snapshot: Vec::new(),
            filters: FilterState::default(),
            loading: false,
            pins,
            pinned,
            options: FilterOptions::default(),
            displayed: Vec::new(),
        }
    }

    /// Replaces the fetched records wholesale.
    pub fn set_snapshot(&mut self, snapshot: Vec<ProjectPipelines>) {
        self.snapshot = snapshot;
        self.options = FilterOptions::collect(&self.flattened(), ViewKind::Pipelines);
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

    pub fn pinned(&self) -> &[PipelineId] {
        &self.pinned
    }

    /// Replaces the pinned set and saves it to session storage.
    ///
    /// Pins are kept even when the pipeline is not in the current snapshot.
    pub fn set_pinned(&mut self, pinned: Vec<PipelineId>) {
        self.pinned = pinned;
        self.pins.save(&self.pinned);
        self.recompute();
    }

    pub fn pin(&mut self, id: PipelineId) {
        if !self.pinned.contains(&id) {
            let mut pinned = self.pinned.clone();
            pinned.push(id);
            self.set_pinned(pinned);
        }
    }

    pub fn unpin(&mut self, id: PipelineId) {
        if self.pinned.contains(&id) {
            let pinned = self.pinned.iter().copied().filter(|p| *p != id).collect();
            self.set_pinned(pinned);
        }
    }

    pub fn toggle_pin(&mut self, id: PipelineId) {
        if self.pinned.contains(&id) {
            self.unpin(id);
        } else {
            self.pin(id);
        }
    }

    pub fn is_pinned(&self, id: PipelineId) -> bool {
        self.pinned.contains(&id)
    }

    pub fn displayed(&self) -> &[ProjectPipeline] {
        &self.displayed
    }

    fn flattened(&self) -> Vec<ProjectPipeline> {
        self.snapshot.iter().flat_map(ProjectPipelines::flatten).collect()
    }

    fn recompute(&mut self) {
        let mut displayed = apply_filters(&self.flattened(), &self.filters, ViewKind::Pipelines);
        sort_by_recency(&mut displayed);
        sort_pinned_first(&mut displayed, &self.pinned);
        self.displayed = displayed;
    }
}
