use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::PipelineRecord;
use crate::view::ViewKind;

/// Current filter values of one dashboard view.
///
/// Text filters match by case-insensitive substring, set filters by
/// membership. Empty values match everything, and all active filters are
/// combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub project: String,
    pub group: String,
    pub branch: String,
    pub trigger: String,
    pub status: String,
    pub topics: Vec<String>,
    pub jobs: Vec<String>,
}

impl FilterState {
    pub fn set_project(&mut self, value: impl Into<String>) -> &mut Self {
        self.project = value.into();
        self
    }

    pub fn set_group(&mut self, value: impl Into<String>) -> &mut Self {
        self.group = value.into();
        self
    }

    pub fn set_branch(&mut self, value: impl Into<String>) -> &mut Self {
        self.branch = value.into();
        self
    }

    pub fn set_trigger(&mut self, value: impl Into<String>) -> &mut Self {
        self.trigger = value.into();
        self
    }

    pub fn set_status(&mut self, value: impl Into<String>) -> &mut Self {
        self.status = value.into();
        self
    }

    pub fn set_topics(&mut self, value: Vec<String>) -> &mut Self {
        self.topics = value;
        self
    }

    pub fn set_jobs(&mut self, value: Vec<String>) -> &mut Self {
        self.jobs = value;
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Distinct, sorted values used to populate filter pickers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub projects: Vec<String>,
    pub groups: Vec<String>,
    pub branches: Vec<String>,
    pub topics: Vec<String>,
    pub jobs: Vec<String>,
}

impl FilterOptions {
    /// Collects options from the unfiltered snapshot.
    ///
    /// Outside the schedules view, projects and groups only count when the
    /// record carries a pipeline. Branches always come from pipeline refs.
    pub fn collect<R: PipelineRecord>(records: &[R], kind: ViewKind) -> Self {
        let mut projects = BTreeSet::new();
        let mut groups = BTreeSet::new();
        let mut branches = BTreeSet::new();
        let mut topics = BTreeSet::new();
        let mut jobs = BTreeSet::new();

        for record in records {
            let project = record.project();
            topics.extend(project.topics.iter().cloned());
            jobs.extend(record.failed_jobs().iter().map(|job| job.name.clone()));

            let pipeline = record.pipeline();
            if pipeline.is_some() || kind.lists_projects_without_pipeline() {
                projects.insert(project.name.clone());
                groups.insert(project.namespace.name.clone());
            }
            if let Some(pipeline) = pipeline.filter(|p| !p.ref_.is_empty()) {
                branches.insert(pipeline.ref_.clone());
            }
        }

        Self {
            projects: projects.into_iter().collect(),
            groups: groups.into_iter().collect(),
            branches: branches.into_iter().collect(),
            topics: topics.into_iter().collect(),
            jobs: jobs.into_iter().collect(),
        }
    }
}
