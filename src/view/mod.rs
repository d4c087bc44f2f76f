//! Turns fetched snapshots plus filter state into what the dashboard shows.
//!
//! The free functions here are pure; the view structs keep the inputs and
//! recompute their outputs explicitly whenever an input changes.

mod latest;
mod pipelines;
mod schedules;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::filter::{contains_ignore_case, matches_failed_jobs, matches_pipeline_field, matches_project};
use crate::model::{PipelineId, PipelineRecord, Tab};
use crate::state::FilterState;

pub use latest::LatestPipelinesView;
pub use pipelines::PipelinesView;
pub use schedules::SchedulesView;

/// The three dashboard views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewKind {
    /// Latest default-branch pipeline per project, tabbed by status
    Latest,
    /// Recent pipelines of every project, with pinning
    Pipelines,
    /// Pipeline schedules and their last pipeline
    Schedules,
}

impl ViewKind {
    /// Branch shown and filtered for a record.
    ///
    /// The latest view is about the default branch, so it reads the project;
    /// the other views read the pipeline ref.
    pub fn branch<R: PipelineRecord>(self, record: &R) -> Option<&str> {
        match self {
            Self::Latest => Some(record.project().default_branch.as_str()),
            Self::Pipelines | Self::Schedules => record.pipeline().map(|p| p.ref_.as_str()),
        }
    }

    /// Latest pipelines are split into status tabs instead.
    pub fn filters_status(self) -> bool {
        !matches!(self, Self::Latest)
    }

    /// Only views that fetch failed jobs can filter on them.
    pub fn filters_jobs(self) -> bool {
        !matches!(self, Self::Pipelines)
    }

    /// A schedule that never ran is still listed, so its project is pickable.
    pub fn lists_projects_without_pipeline(self) -> bool {
        matches!(self, Self::Schedules)
    }
}

fn matches_branch<R: PipelineRecord>(record: &R, filter: &str, kind: ViewKind) -> bool {
    filter.is_empty() || kind.branch(record).is_some_and(|branch| contains_ignore_case(branch, filter))
}

/// Applies the AND chain of every filter relevant to `kind`.
///
/// Never mutates `records`; survivors are cloned in their original order.
pub fn apply_filters<R>(records: &[R], filters: &FilterState, kind: ViewKind) -> Vec<R>
where
    R: PipelineRecord + Clone,
{
    records
        .iter()
        .filter(|r| contains_ignore_case(&r.project().name, &filters.project))
        .filter(|r| contains_ignore_case(&r.project().namespace.name, &filters.group))
        .filter(|r| matches_branch(*r, &filters.branch, kind))
        .filter(|r| matches_pipeline_field(r.pipeline(), |p| p.source.as_str(), &filters.trigger))
        .filter(|r| {
            !kind.filters_status()
                || matches_pipeline_field(r.pipeline(), |p| p.status.as_str(), &filters.status)
        })
        .filter(|r| matches_project(r.project(), &filters.project, &filters.topics))
        .filter(|r| !kind.filters_jobs() || matches_failed_jobs(r.failed_jobs(), &filters.jobs))
        .cloned()
        .collect()
}

fn updated_at_millis<R: PipelineRecord>(record: &R) -> i64 {
    record
        .pipeline()
        .map_or(0, |pipeline| pipeline.updated_at.timestamp_millis())
}

/// Most recently updated pipeline first; records without a pipeline go last.
pub fn sort_by_recency<R: PipelineRecord>(records: &mut [R]) {
    records.sort_by_key(|record| std::cmp::Reverse(updated_at_millis(record)));
}

/// Moves pinned pipelines to the front, keeping relative order on both sides.
pub fn sort_pinned_first<R: PipelineRecord>(records: &mut [R], pinned: &[PipelineId]) {
    records.sort_by_key(|record| {
        !record
            .pipeline()
            .is_some_and(|pipeline| pinned.contains(&pipeline.id))
    });
}

/// Groups records by pipeline status, one tab per status in lexical order.
///
/// Records without a pipeline have no status and are dropped.
pub fn group_by_status<R>(records: Vec<R>) -> Vec<Tab<R>>
where
    R: PipelineRecord,
{
    let mut by_status: BTreeMap<String, Vec<R>> = BTreeMap::new();

    for record in records {
        let Some(status) = record.pipeline().map(|p| p.status.clone()) else {
            continue;
        };
        by_status.entry(status).or_default().push(record);
    }

    by_status
        .into_iter()
        .map(|(status, records)| Tab { status, records })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{job, pipeline, project, record};
    use crate::model::ProjectPipeline;

    fn ids(records: &[ProjectPipeline]) -> Vec<u64> {
        records
            .iter()
            .map(|r| r.pipeline.as_ref().map_or(0, |p| p.id))
            .collect()
    }

    fn sample() -> Vec<ProjectPipeline> {
        let mut api = project(1, "Payments-API", "Backend");
        api.topics = vec!["rust".to_string()];
        let mut failing = record(api, Some(pipeline(10, "failed", 300)));
        failing.failed_jobs = Some(vec![job(1, "unit-tests", 10)]);

        let mut web = project(2, "storefront", "Frontend");
        web.default_branch = "develop".to_string();
        let mut web_pipeline = pipeline(11, "success", 200);
        web_pipeline.ref_ = "feature/cart".to_string();
        web_pipeline.source = "merge_request_event".to_string();

        vec![
            failing,
            record(web, Some(web_pipeline)),
            record(project(3, "docs", "Frontend"), None),
        ]
    }

    #[test]
    fn test_empty_filters_are_identity() {
        let records = sample();
        for kind in [ViewKind::Latest, ViewKind::Pipelines, ViewKind::Schedules] {
            assert_eq!(apply_filters(&records, &FilterState::default(), kind), records);
        }
    }

    #[test]
    fn test_text_filters_ignore_case() {
        let records = sample();
        let mut upper = FilterState::default();
        upper.set_project("API");
        let mut lower = FilterState::default();
        lower.set_project("api");

        let a = apply_filters(&records, &upper, ViewKind::Pipelines);
        let b = apply_filters(&records, &lower, ViewKind::Pipelines);
        assert_eq!(a, b);
        assert_eq!(ids(&a), vec![10]);
    }

    #[test]
    fn test_group_filter() {
        let mut filters = FilterState::default();
        filters.set_group("front");
        let filtered = apply_filters(&sample(), &filters, ViewKind::Latest);
        assert_eq!(ids(&filtered), vec![11, 0]);
    }

    #[test]
    fn test_branch_filter_uses_default_branch_in_latest_view() {
        let mut filters = FilterState::default();
        filters.set_branch("develop");
        assert_eq!(ids(&apply_filters(&sample(), &filters, ViewKind::Latest)), vec![11]);
        assert!(apply_filters(&sample(), &filters, ViewKind::Pipelines).is_empty());
    }

    #[test]
    fn test_branch_filter_uses_pipeline_ref_in_list_views() {
        let mut filters = FilterState::default();
        filters.set_branch("feature/");
        assert_eq!(ids(&apply_filters(&sample(), &filters, ViewKind::Schedules)), vec![11]);
    }

    #[test]
    fn test_pipeline_filters_drop_records_without_pipeline() {
        let mut filters = FilterState::default();
        filters.set_trigger("push");
        assert_eq!(ids(&apply_filters(&sample(), &filters, ViewKind::Latest)), vec![10]);
    }

    #[test]
    fn test_status_filter_only_applies_to_list_views() {
        let mut filters = FilterState::default();
        filters.set_status("fail");
        assert_eq!(ids(&apply_filters(&sample(), &filters, ViewKind::Pipelines)), vec![10]);
        assert_eq!(apply_filters(&sample(), &filters, ViewKind::Latest).len(), 3);
    }

    #[test]
    fn test_topic_and_job_filters() {
        let mut filters = FilterState::default();
        filters.set_topics(vec!["RUST".to_string()]);
        assert_eq!(ids(&apply_filters(&sample(), &filters, ViewKind::Latest)), vec![10]);

        let mut filters = FilterState::default();
        filters.set_jobs(vec!["unit".to_string()]);
        assert_eq!(ids(&apply_filters(&sample(), &filters, ViewKind::Schedules)), vec![10]);
        // The list view never has failed jobs to match against
        assert_eq!(apply_filters(&sample(), &filters, ViewKind::Pipelines).len(), 3);
    }

    #[test]
    fn test_filters_compose_with_and() {
        let mut filters = FilterState::default();
        filters.set_group("frontend").set_trigger("push");
        assert!(apply_filters(&sample(), &filters, ViewKind::Pipelines).is_empty());
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let records = sample();
        let mut filters = FilterState::default();
        filters.set_group("end");
        let first = apply_filters(&records, &filters, ViewKind::Schedules);
        let second = apply_filters(&records, &filters, ViewKind::Schedules);
        assert_eq!(first, second);
    }

    #[test]
    fn test_sort_by_recency() {
        let mut records = vec![
            record(project(1, "a", "g"), Some(pipeline(2, "success", 200))),
            record(project(2, "b", "g"), None),
            record(project(3, "c", "g"), Some(pipeline(1, "success", 300))),
            record(project(4, "d", "g"), Some(pipeline(3, "success", 100))),
        ];
        sort_by_recency(&mut records);
        assert_eq!(ids(&records), vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_pinned_pipeline_moves_to_front() {
        let mut records = vec![
            record(project(1, "a", "g"), Some(pipeline(1, "success", 300))),
            record(project(2, "b", "g"), Some(pipeline(2, "success", 200))),
            record(project(3, "c", "g"), Some(pipeline(3, "success", 100))),
        ];
        sort_by_recency(&mut records);
        sort_pinned_first(&mut records, &[2]);
        assert_eq!(ids(&records), vec![2, 1, 3]);
    }

    #[test]
    fn test_pin_sort_is_stable() {
        let mut records = vec![
            record(project(1, "a", "g"), Some(pipeline(1, "success", 400))),
            record(project(2, "b", "g"), Some(pipeline(2, "success", 300))),
            record(project(3, "c", "g"), Some(pipeline(3, "success", 200))),
            record(project(4, "d", "g"), Some(pipeline(4, "success", 100))),
        ];
        sort_by_recency(&mut records);
        sort_pinned_first(&mut records, &[4, 2]);
        assert_eq!(ids(&records), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_pins_for_missing_pipelines_are_harmless() {
        let mut records = vec![record(project(1, "a", "g"), Some(pipeline(1, "success", 1)))];
        sort_pinned_first(&mut records, &[99]);
        assert_eq!(ids(&records), vec![1]);
    }

    #[test]
    fn test_group_by_status_sorts_tabs_alphabetically() {
        let records = vec![
            record(project(1, "a", "g"), Some(pipeline(1, "failed", 0))),
            record(project(2, "b", "g"), Some(pipeline(2, "success", 0))),
            record(project(3, "c", "g"), Some(pipeline(3, "failed", 0))),
        ];

        let tabs = group_by_status(records);
        let statuses: Vec<_> = tabs.iter().map(|t| t.status.as_str()).collect();
        assert_eq!(statuses, vec!["failed", "success"]);
        assert_eq!(ids(&tabs[0].records), vec![1, 3]);
        assert_eq!(tabs[1].records.len(), 1);
    }

    #[test]
    fn test_group_by_status_drops_records_without_pipeline() {
        let records = vec![
            record(project(1, "a", "g"), None),
            record(project(2, "b", "g"), Some(pipeline(2, "running", 0))),
        ];
        let tabs = group_by_status(records);
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].status, "running");
    }
}
