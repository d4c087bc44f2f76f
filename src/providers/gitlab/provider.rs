use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use log::{debug, info};

use crate::auth::Token;
use crate::error::{CidashError, Result};
use crate::model::{
    GroupId, Job, Pipeline, Project, ProjectIdSet, ProjectPipeline, ProjectPipelines,
    ScheduleProjectPipeline,
};
use crate::poller::GroupFetcher;

use super::client::GitLabClient;

/// Assembles dashboard records from the GitLab REST API.
///
/// Every fetch for a group runs its per-project requests concurrently and
/// returns records in project order. Any failing request fails the group.
pub struct GitLabProvider {
    client: GitLabClient,
    pipelines_per_project: usize,
}

impl GitLabProvider {
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn new(base_url: &str, token: Option<Token>, pipelines_per_project: usize) -> Result<Self> {
        Ok(Self {
            client: GitLabClient::new(base_url, token)?,
            pipelines_per_project,
        })
    }

    pub async fn projects_in_group(
        &self,
        group_id: GroupId,
        project_ids: &ProjectIdSet,
    ) -> Result<Vec<Project>> {
        let projects = self
            .client
            .fetch_group_projects(group_id, project_ids)
            .await?;
        debug!("Group {group_id}: {} projects", projects.len());
        Ok(projects)
    }

    /// Failed jobs are only looked up for failed pipelines.
    async fn failed_jobs_for(&self, pipeline: &Pipeline) -> Result<Option<Vec<Job>>> {
        if pipeline.status != "failed" {
            return Ok(None);
        }

        let jobs = self
            .client
            .fetch_failed_jobs(pipeline.project_id, pipeline.id)
            .await?;
        Ok(Some(jobs))
    }

    /// Latest pipeline on the default branch of every project.
    pub async fn latest_pipelines(
        &self,
        group_id: GroupId,
        project_ids: &ProjectIdSet,
    ) -> Result<Vec<ProjectPipeline>> {
        let projects = self.projects_in_group(group_id, project_ids).await?;

        let records = projects.into_iter().map(|project| async move {
            let pipeline = self
                .client
                .fetch_latest_pipeline(project.id, &project.default_branch)
                .await?;

            let failed_jobs = match &pipeline {
                Some(pipeline) => self.failed_jobs_for(pipeline).await?,
                None => None,
            };

            Ok::<_, CidashError>(ProjectPipeline {
                group_id,
                project,
                pipeline,
                failed_jobs,
            })
        });

        try_join_all(records).await
    }

    /// The most recent pipelines of every project on any ref.
    pub async fn project_pipelines(
        &self,
        group_id: GroupId,
        project_ids: &ProjectIdSet,
    ) -> Result<Vec<ProjectPipelines>> {
        let projects = self.projects_in_group(group_id, project_ids).await?;

        let records = projects.into_iter().map(|project| async move {
            let pipelines = self
                .client
                .fetch_recent_pipelines(project.id, self.pipelines_per_project)
                .await?;

            Ok::<_, CidashError>(ProjectPipelines {
                group_id,
                project,
                pipelines,
            })
        });

        try_join_all(records).await
    }

    /// Every pipeline schedule paired with the last pipeline it produced.
    pub async fn schedule_pipelines(
        &self,
        group_id: GroupId,
        project_ids: &ProjectIdSet,
    ) -> Result<Vec<ScheduleProjectPipeline>> {
        let projects = self.projects_in_group(group_id, project_ids).await?;

        let per_project = projects.into_iter().map(|project| async move {
            let schedules = self.client.fetch_schedules(project.id).await?;

            let records = schedules.into_iter().map(|schedule| {
                let project = project.clone();
                async move {
                    let last = self
                        .client
                        .fetch_schedule_last_pipeline(project.id, schedule.id)
                        .await?;

                    let pipeline = match last {
                        Some(pipeline_id) => {
                            self.client.fetch_pipeline(project.id, pipeline_id).await?
                        }
                        None => None,
                    };

                    let failed_jobs = match &pipeline {
                        Some(pipeline) => self.failed_jobs_for(pipeline).await?,
                        None => None,
                    };

                    Ok::<_, CidashError>(ScheduleProjectPipeline {
                        group_id,
                        schedule,
                        project,
                        pipeline,
                        failed_jobs,
                    })
                }
            });

            try_join_all(records).await
        });

        let records: Vec<_> = try_join_all(per_project)
            .await?
            .into_iter()
            .flatten()
            .collect();

        info!("Group {group_id}: {} schedules", records.len());
        Ok(records)
    }
}

/// Feeds the latest-pipelines view.
pub struct LatestPipelineFetcher(pub Arc<GitLabProvider>);

/// Feeds the pipelines list view.
pub struct ProjectPipelinesFetcher(pub Arc<GitLabProvider>);

/// Feeds the schedules view.
pub struct ScheduleFetcher(pub Arc<GitLabProvider>);

#[async_trait]
impl GroupFetcher for LatestPipelineFetcher {
    type Record = ProjectPipeline;

    async fn fetch_group(
        &self,
        group_id: GroupId,
        project_ids: &ProjectIdSet,
    ) -> Result<Vec<Self::Record>> {
        self.0.latest_pipelines(group_id, project_ids).await
    }
}

#[async_trait]
impl GroupFetcher for ProjectPipelinesFetcher {
    type Record = ProjectPipelines;

    async fn fetch_group(
        &self,
        group_id: GroupId,
        project_ids: &ProjectIdSet,
    ) -> Result<Vec<Self::Record>> {
        self.0.project_pipelines(group_id, project_ids).await
    }
}

#[async_trait]
impl GroupFetcher for ScheduleFetcher {
    type Record = ScheduleProjectPipeline;

    async fn fetch_group(
        &self,
        group_id: GroupId,
        project_ids: &ProjectIdSet,
    ) -> Result<Vec<Self::Record>> {
        self.0.schedule_pipelines(group_id, project_ids).await
    }
}
