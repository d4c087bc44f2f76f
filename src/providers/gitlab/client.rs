mod core;
mod pipelines;
mod projects;
mod schedules;

pub use self::core::GitLabClient;
