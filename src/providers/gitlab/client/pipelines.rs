use super::core::GitLabClient;
use crate::error::Result;
use crate::model::{Job, Pipeline, PipelineId, ProjectId};
use crate::providers::gitlab::types::{ApiJob, ApiPipeline};

impl GitLabClient {
    /// Latest pipeline for `ref_`, or `None` when the ref never ran a pipeline.
    pub async fn fetch_latest_pipeline(
        &self,
        project_id: ProjectId,
        ref_: &str,
    ) -> Result<Option<Pipeline>> {
        let mut query = Vec::new();
        if !ref_.is_empty() {
            query.push(("ref", ref_.to_string()));
        }

        let pipeline: Option<ApiPipeline> = self
            .get_optional_json(&format!("projects/{project_id}/pipelines/latest"), &query)
            .await?;

        Ok(pipeline.map(Pipeline::from))
    }

    /// Most recently updated pipelines of a project, newest first.
    pub async fn fetch_recent_pipelines(
        &self,
        project_id: ProjectId,
        limit: usize,
    ) -> Result<Vec<Pipeline>> {
        let pipelines: Vec<ApiPipeline> = self
            .get_json(
                &format!("projects/{project_id}/pipelines"),
                &[
                    ("per_page", limit.to_string()),
                    ("order_by", "updated_at".to_string()),
                    ("sort", "desc".to_string()),
                ],
            )
            .await?;

        Ok(pipelines.into_iter().map(Pipeline::from).collect())
    }

    pub async fn fetch_pipeline(
        &self,
        project_id: ProjectId,
        pipeline_id: PipelineId,
    ) -> Result<Option<Pipeline>> {
        let pipeline: Option<ApiPipeline> = self
            .get_optional_json(&format!("projects/{project_id}/pipelines/{pipeline_id}"), &[])
            .await?;

        Ok(pipeline.map(Pipeline::from))
    }

    /// Failed jobs of a pipeline, excluding retried attempts.
    pub async fn fetch_failed_jobs(
        &self,
        project_id: ProjectId,
        pipeline_id: PipelineId,
    ) -> Result<Vec<Job>> {
        let jobs: Vec<ApiJob> = self
            .get_all(
                &format!("projects/{project_id}/pipelines/{pipeline_id}/jobs"),
                &[("scope[]", "failed".to_string())],
            )
            .await?;

        Ok(jobs
            .into_iter()
            .map(|job| job.into_job(pipeline_id))
            .collect())
    }
}
