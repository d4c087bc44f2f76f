//! Raw GitLab REST payloads and their conversion into dashboard models.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::{Job, Namespace, Pipeline, Project, Schedule};

#[derive(Debug, Clone, Deserialize)]
pub struct ApiNamespace {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiProject {
    pub id: u64,
    pub name: String,
    pub namespace: ApiNamespace,
    /// `null` for repositories without commits
    pub default_branch: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl From<ApiProject> for Project {
    fn from(project: ApiProject) -> Self {
        Self {
            id: project.id,
            name: project.name,
            namespace: Namespace {
                id: project.namespace.id,
                name: project.namespace.name,
            },
            default_branch: project.default_branch.unwrap_or_default(),
            topics: project.topics,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPipeline {
    pub id: u64,
    #[serde(default)]
    pub iid: u64,
    pub project_id: u64,
    #[serde(default)]
    pub sha: String,
    #[serde(rename = "ref", default)]
    pub ref_: Option<String>,
    pub status: String,
    /// Missing on older GitLab versions
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub web_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ApiPipeline> for Pipeline {
    fn from(pipeline: ApiPipeline) -> Self {
        Self {
            id: pipeline.id,
            iid: pipeline.iid,
            project_id: pipeline.project_id,
            sha: pipeline.sha,
            ref_: pipeline.ref_.unwrap_or_default(),
            status: pipeline.status.to_lowercase(),
            source: pipeline.source.unwrap_or_default(),
            web_url: pipeline.web_url,
            created_at: pipeline.created_at,
            updated_at: pipeline.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiJob {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub stage: String,
    pub status: String,
}

impl ApiJob {
    pub fn into_job(self, pipeline_id: u64) -> Job {
        Job {
            id: self.id,
            name: self.name,
            stage: self.stage,
            status: self.status,
            pipeline_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub username: String,
}

/// Last pipeline reference embedded in a schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPipelineRef {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSchedule {
    pub id: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "ref", default)]
    pub ref_: Option<String>,
    #[serde(default)]
    pub cron: String,
    #[serde(default)]
    pub cron_timezone: String,
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active: bool,
    pub owner: Option<ApiUser>,
    /// Only present on the single-schedule endpoint
    #[serde(default)]
    pub last_pipeline: Option<ApiPipelineRef>,
}

impl From<ApiSchedule> for Schedule {
    fn from(schedule: ApiSchedule) -> Self {
        Self {
            id: schedule.id,
            description: schedule.description.unwrap_or_default(),
            // Schedules store refs as "refs/heads/main" on some versions
            ref_: schedule
                .ref_
                .map(|r| r.trim_start_matches("refs/heads/").to_string())
                .unwrap_or_default(),
            cron: schedule.cron,
            cron_timezone: schedule.cron_timezone,
            next_run_at: schedule.next_run_at,
            active: schedule.active,
            owner: schedule.owner.map(|o| o.username).unwrap_or_default(),
        }
    }
}
