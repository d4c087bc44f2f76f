use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

pub type GroupId = u64;
pub type ProjectId = u64;
pub type PipelineId = u64;
pub type JobId = u64;
pub type ScheduleId = u64;

/// Projects selected inside a group. Empty means every project of the group.
pub type ProjectIdSet = IndexSet<ProjectId>;

/// Groups to fetch, in submission order.
pub type GroupMap = IndexMap<GroupId, ProjectIdSet>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub id: u64,
    pub name: String,
}

/// A GitLab project as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub namespace: Namespace,
    /// Empty when the repository has no default branch yet
    pub default_branch: String,
    pub topics: Vec<String>,
}

/// One execution of a project's CI/CD workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    pub iid: u64,
    pub project_id: ProjectId,
    pub sha: String,
    /// Branch or tag the pipeline ran for
    #[serde(rename = "ref")]
    pub ref_: String,
    /// Lowercase GitLab status (e.g. "success", "failed", "running")
    pub status: String,
    /// Trigger source (e.g. "push", "schedule", "web")
    pub source: String,
    pub web_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A failed job, kept only for job-name filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub stage: String,
    pub status: String,
    pub pipeline_id: PipelineId,
}

/// A recurring pipeline trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub description: String,
    #[serde(rename = "ref")]
    pub ref_: String,
    pub cron: String,
    pub cron_timezone: String,
    pub next_run_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub owner: String,
}

/// A project with its latest default-branch pipeline, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPipeline {
    pub group_id: GroupId,
    pub project: Project,
    pub pipeline: Option<Pipeline>,
    pub failed_jobs: Option<Vec<Job>>,
}

/// A project with its most recent pipelines, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPipelines {
    pub group_id: GroupId,
    pub project: Project,
    pub pipelines: Vec<Pipeline>,
}

impl ProjectPipelines {
    /// Splits into one record per pipeline, dropping projects without pipelines.
    pub fn flatten(&self) -> impl Iterator<Item = ProjectPipeline> + '_ {
        self.pipelines.iter().map(|pipeline| ProjectPipeline {
            group_id: self.group_id,
            project: self.project.clone(),
            pipeline: Some(pipeline.clone()),
            failed_jobs: None,
        })
    }
}

/// A schedule paired with the last pipeline it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleProjectPipeline {
    pub group_id: GroupId,
    pub schedule: Schedule,
    pub project: Project,
    pub pipeline: Option<Pipeline>,
    pub failed_jobs: Option<Vec<Job>>,
}

/// Read access shared by every record type flowing through the filters.
pub trait PipelineRecord {
    fn project(&self) -> &Project;
    fn pipeline(&self) -> Option<&Pipeline>;
    fn failed_jobs(&self) -> &[Job];
}

impl PipelineRecord for ProjectPipeline {
    fn project(&self) -> &Project {
        &self.project
    }

    fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    fn failed_jobs(&self) -> &[Job] {
        self.failed_jobs.as_deref().unwrap_or_default()
    }
}

impl PipelineRecord for ScheduleProjectPipeline {
    fn project(&self) -> &Project {
        &self.project
    }

    fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    fn failed_jobs(&self) -> &[Job] {
        self.failed_jobs.as_deref().unwrap_or_default()
    }
}

/// Records sharing one pipeline status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tab<R> {
    pub status: String,
    pub records: Vec<R>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::TimeZone;

    use super::*;

    pub fn project(id: ProjectId, name: &str, group: &str) -> Project {
        Project {
            id,
            name: name.to_string(),
            namespace: Namespace {
                id: 1,
                name: group.to_string(),
            },
            default_branch: "main".to_string(),
            topics: vec![],
        }
    }

    pub fn pipeline(id: PipelineId, status: &str, updated_secs: i64) -> Pipeline {
        let at = Utc.timestamp_opt(updated_secs, 0).unwrap();
        Pipeline {
            id,
            iid: id,
            project_id: 1,
            sha: "abc123".to_string(),
            ref_: "main".to_string(),
            status: status.to_string(),
            source: "push".to_string(),
            web_url: format!("https://gitlab.com/group/project/-/pipelines/{id}"),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn job(id: JobId, name: &str, pipeline_id: PipelineId) -> Job {
        Job {
            id,
            name: name.to_string(),
            stage: "test".to_string(),
            status: "failed".to_string(),
            pipeline_id,
        }
    }

    pub fn record(project: Project, pipeline: Option<Pipeline>) -> ProjectPipeline {
        ProjectPipeline {
            group_id: 1,
            project,
            pipeline,
            failed_jobs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_flatten_project_pipelines() {
        let pipelines = ProjectPipelines {
            group_id: 7,
            project: project(1, "api", "backend"),
            pipelines: vec![pipeline(10, "success", 100), pipeline(11, "failed", 200)],
        };

        let flat: Vec<_> = pipelines.flatten().collect();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].group_id, 7);
        assert_eq!(flat[0].pipeline.as_ref().map(|p| p.id), Some(10));
        assert_eq!(flat[1].pipeline.as_ref().map(|p| p.id), Some(11));
    }

    #[test]
    fn test_flatten_without_pipelines_is_empty() {
        let pipelines = ProjectPipelines {
            group_id: 7,
            project: project(1, "api", "backend"),
            pipelines: vec![],
        };
        assert_eq!(pipelines.flatten().count(), 0);
    }

    #[test]
    fn test_missing_failed_jobs_read_as_empty() {
        let record = record(project(1, "api", "backend"), None);
        assert!(record.failed_jobs().is_empty());
    }

    #[test]
    fn test_pipeline_serializes_ref_field() {
        let json = serde_json::to_string(&pipeline(1, "success", 0)).unwrap();
        assert!(json.contains("\"ref\":\"main\""));
    }
}
