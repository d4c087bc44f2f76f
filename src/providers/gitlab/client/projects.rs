use super::core::GitLabClient;
use crate::error::Result;
use crate::model::{GroupId, Project, ProjectIdSet};
use crate::providers::gitlab::types::ApiProject;

impl GitLabClient {
    /// Fetches the non-archived projects of a group, including subgroups.
    ///
    /// When `project_ids` is non-empty only those projects are returned, in
    /// the order GitLab lists them.
    pub async fn fetch_group_projects(
        &self,
        group_id: GroupId,
        project_ids: &ProjectIdSet,
    ) -> Result<Vec<Project>> {
        let projects: Vec<ApiProject> = self
            .get_all(
                &format!("groups/{group_id}/projects"),
                &[
                    ("include_subgroups", "true".to_string()),
                    ("archived", "false".to_string()),
                    ("order_by", "name".to_string()),
                    ("sort", "asc".to_string()),
                ],
            )
            .await?;

        Ok(projects
            .into_iter()
            .filter(|project| project_ids.is_empty() || project_ids.contains(&project.id))
            .map(Project::from)
            .collect())
    }
}
