use super::core::GitLabClient;
use crate::error::Result;
use crate::model::{PipelineId, ProjectId, Schedule, ScheduleId};
use crate::providers::gitlab::types::ApiSchedule;

impl GitLabClient {
    pub async fn fetch_schedules(&self, project_id: ProjectId) -> Result<Vec<Schedule>> {
        let schedules: Vec<ApiSchedule> = self
            .get_all(&format!("projects/{project_id}/pipeline_schedules"), &[])
            .await?;

        Ok(schedules.into_iter().map(Schedule::from).collect())
    }

    /// Id of the last pipeline a schedule produced, if it ever ran.
    pub async fn fetch_schedule_last_pipeline(
        &self,
        project_id: ProjectId,
        schedule_id: ScheduleId,
    ) -> Result<Option<PipelineId>> {
        let schedule: Option<ApiSchedule> = self
            .get_optional_json(
                &format!("projects/{project_id}/pipeline_schedules/{schedule_id}"),
                &[],
            )
            .await?;

        Ok(schedule.and_then(|s| s.last_pipeline).map(|p| p.id))
    }
}
