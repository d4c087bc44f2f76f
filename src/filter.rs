//! Predicates used by the view builder.
//!
//! Every predicate treats an empty filter value as "match everything", so
//! inactive filters are the identity element of the AND chain.

use crate::model::{Job, Pipeline, Project};

/// Case-insensitive substring match. An empty needle always matches.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Matches the project name against `text` and its topics against `topics`.
///
/// With a non-empty topic filter, at least one selected topic must be present
/// on the project (compared case-insensitively).
pub fn matches_project(project: &Project, text: &str, topics: &[String]) -> bool {
    let topics_match = topics.is_empty()
        || topics.iter().any(|wanted| {
            project
                .topics
                .iter()
                .any(|topic| topic.to_lowercase() == wanted.to_lowercase())
        });

    topics_match && contains_ignore_case(&project.name, text)
}

/// True when no job names are selected or any failed job name contains one of them.
pub fn matches_failed_jobs(jobs: &[Job], job_names: &[String]) -> bool {
    job_names.is_empty()
        || jobs.iter().any(|job| {
            job_names
                .iter()
                .any(|name| contains_ignore_case(&job.name, name))
        })
}

/// Null-safe match on a pipeline field.
///
/// An empty filter matches even when there is no pipeline; otherwise a missing
/// pipeline never matches.
pub fn matches_pipeline_field<F>(pipeline: Option<&Pipeline>, field: F, filter: &str) -> bool
where
    F: Fn(&Pipeline) -> &str,
{
    if filter.is_empty() {
        return true;
    }
    pipeline.is_some_and(|pipeline| contains_ignore_case(field(pipeline), filter))
}
