mod gitlab;

pub use gitlab::{
    GitLabProvider, LatestPipelineFetcher, ProjectPipelinesFetcher, ScheduleFetcher,
};
