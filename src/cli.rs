use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use console::Term;
use log::{debug, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::Token;
use crate::config::{Config, GroupSelection, OutputFormat};
use crate::model::{GroupMap, PipelineId, ProjectPipeline, ProjectPipelines, ScheduleProjectPipeline};
use crate::output::{self, export_csv, DashboardStatus, DirectoryDownloader, LoadingSpinner};
use crate::pins::{KeyValueStore, MemoryStore, PinStore, SessionFileStore};
use crate::poller::{fork_join_flatten, GroupFetcher, Poller};
use crate::providers::{
    GitLabProvider, LatestPipelineFetcher, ProjectPipelinesFetcher, ScheduleFetcher,
};
use crate::state::{FilterOptions, FilterState};
use crate::view::{LatestPipelinesView, PipelinesView, SchedulesView, ViewKind};

#[derive(Parser)]
#[command(name = "cidash")]
#[command(author, version, about = "CI/CD pipeline dashboard for GitLab groups", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file, defaults to ./cidash.{toml,json,yaml,yml}
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// GitLab instance base URL
    #[arg(short, long, global = true)]
    url: Option<String>,

    #[arg(short, long, global = true, env = "GITLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Group to watch as GROUP or GROUP:PROJECT,PROJECT (repeatable)
    #[arg(short, long = "group", global = true, value_parser = parse_group)]
    groups: Vec<GroupSelection>,

    /// Refresh interval in seconds
    #[arg(short, long, global = true)]
    interval: Option<u64>,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Keep pins in memory only
    #[arg(long, global = true, default_value_t = false)]
    no_session: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Latest default-branch pipeline of every project, tabbed by status
    Latest(ViewArgs),

    /// Recent pipelines of every project, pinned ones first
    Pipelines {
        #[command(flatten)]
        view: ViewArgs,

        /// Pin a pipeline id (repeatable)
        #[arg(long)]
        pin: Vec<PipelineId>,

        /// Unpin a pipeline id (repeatable)
        #[arg(long)]
        unpin: Vec<PipelineId>,

        /// Flip the pin of a pipeline id (repeatable)
        #[arg(long)]
        toggle_pin: Vec<PipelineId>,
    },

    /// Pipeline schedules and the last pipeline each produced
    Schedules(ViewArgs),
}

#[derive(Args)]
struct ViewArgs {
    #[command(flatten)]
    filters: FilterArgs,

    /// Refresh until Ctrl-C
    #[arg(short, long, default_value_t = false)]
    watch: bool,

    /// Write the filtered view as CSV into this directory
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Also print the values each filter can take, on every refresh with --watch
    #[arg(long, default_value_t = false)]
    options: bool,
}

/// Filters are substring matches, case-insensitive.
#[derive(Args)]
struct FilterArgs {
    #[arg(long, default_value = "")]
    project: String,

    #[arg(long, default_value = "")]
    group_name: String,

    #[arg(long, default_value = "")]
    branch: String,

    #[arg(long, default_value = "")]
    trigger: String,

    /// Not accepted by `latest`, which splits pipelines into status tabs
    #[arg(long, default_value = "")]
    status: String,

    /// Project topic, exact and case-insensitive (repeatable)
    #[arg(long = "topic")]
    topics: Vec<String>,

    /// Failed job name (repeatable), not accepted by `pipelines`
    #[arg(long = "job")]
    jobs: Vec<String>,
}

impl FilterArgs {
    fn apply_to(&self, state: &mut FilterState) {
        state
            .set_project(&self.project)
            .set_group(&self.group_name)
            .set_branch(&self.branch)
            .set_trigger(&self.trigger)
            .set_status(&self.status)
            .set_topics(self.topics.clone())
            .set_jobs(self.jobs.clone());
    }

    /// Rejects filters the view would silently drop.
    fn validate(&self, kind: ViewKind) -> Result<()> {
        if !kind.filters_status() && !self.status.is_empty() {
            bail!("--status is not supported here: pipelines are already tabbed by status");
        }
        if !kind.filters_jobs() && !self.jobs.is_empty() {
            bail!("--job is not supported here: this view does not fetch failed jobs");
        }
        Ok(())
    }
}

impl Commands {
    fn view_args(&self) -> (&ViewArgs, ViewKind) {
        match self {
            Self::Latest(args) => (args, ViewKind::Latest),
            Self::Pipelines { view, .. } => (view, ViewKind::Pipelines),
            Self::Schedules(args) => (args, ViewKind::Schedules),
        }
    }
}

fn parse_group(value: &str) -> std::result::Result<GroupSelection, String> {
    GroupSelection::parse(value).map_err(|e| format!("{e:#}"))
}

/// A dashboard view driven by poller snapshots.
trait Dashboard {
    type Record: Clone;

    const KIND: ViewKind;

    fn apply_snapshot(&mut self, records: &[Self::Record]);
    fn set_loading(&mut self, loading: bool);
    fn is_loading(&self) -> bool;
    fn filters(&self) -> &FilterState;
    fn options(&self) -> &FilterOptions;
    fn shown(&self) -> usize;
    fn render(&self, format: OutputFormat, out: &mut dyn Write) -> crate::error::Result<()>;
    fn export(&self, downloader: &DirectoryDownloader) -> crate::error::Result<()>;
}

impl Dashboard for LatestPipelinesView {
    type Record = ProjectPipeline;

    const KIND: ViewKind = ViewKind::Latest;

    fn apply_snapshot(&mut self, records: &[Self::Record]) {
        self.set_snapshot(records.to_vec());
    }

    fn set_loading(&mut self, loading: bool) {
        LatestPipelinesView::set_loading(self, loading);
    }

    fn is_loading(&self) -> bool {
        self.loading()
    }

    fn options(&self) -> &FilterOptions {
        LatestPipelinesView::options(self)
    }

    fn filters(&self) -> &FilterState {
        LatestPipelinesView::filters(self)
    }

    fn shown(&self) -> usize {
        self.filtered().len()
    }

    fn render(&self, format: OutputFormat, out: &mut dyn Write) -> crate::error::Result<()> {
        output::render_latest(self, format, out)
    }

    fn export(&self, downloader: &DirectoryDownloader) -> crate::error::Result<()> {
        export_csv(self.filtered(), Self::KIND, downloader)
    }
}

impl Dashboard for PipelinesView {
    type Record = ProjectPipelines;

    const KIND: ViewKind = ViewKind::Pipelines;

    fn apply_snapshot(&mut self, records: &[Self::Record]) {
        self.set_snapshot(records.to_vec());
    }

    fn set_loading(&mut self, loading: bool) {
        PipelinesView::set_loading(self, loading);
    }

    fn is_loading(&self) -> bool {
        self.loading()
    }

    fn options(&self) -> &FilterOptions {
        PipelinesView::options(self)
    }

    fn filters(&self) -> &FilterState {
        PipelinesView::filters(self)
    }

    fn shown(&self) -> usize {
        self.displayed().len()
    }

    fn render(&self, format: OutputFormat, out: &mut dyn Write) -> crate::error::Result<()> {
        output::render_pipelines(self, format, out)
    }

    fn export(&self, downloader: &DirectoryDownloader) -> crate::error::Result<()> {
        export_csv(self.displayed(), Self::KIND, downloader)
    }
}

impl Dashboard for SchedulesView {
    type Record = ScheduleProjectPipeline;

    const KIND: ViewKind = ViewKind::Schedules;

    fn apply_snapshot(&mut self, records: &[Self::Record]) {
        self.set_snapshot(records.to_vec());
    }

    fn set_loading(&mut self, loading: bool) {
        SchedulesView::set_loading(self, loading);
    }

    fn is_loading(&self) -> bool {
        self.loading()
    }

    fn options(&self) -> &FilterOptions {
        SchedulesView::options(self)
    }

    fn filters(&self) -> &FilterState {
        SchedulesView::filters(self)
    }

    fn shown(&self) -> usize {
        self.displayed().len()
    }

    fn render(&self, format: OutputFormat, out: &mut dyn Write) -> crate::error::Result<()> {
        output::render_schedules(self, format, out)
    }

    fn export(&self, downloader: &DirectoryDownloader) -> crate::error::Result<()> {
        export_csv(self.displayed(), Self::KIND, downloader)
    }
}

/// Everything a view run needs once flags and config are merged.
struct Session {
    groups: GroupMap,
    period: Duration,
    format: OutputFormat,
    provider: Arc<GitLabProvider>,
}

impl Cli {
    /// Merges the config file with command line flags, flags winning.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(url) = &self.url {
            config.gitlab.base_url.clone_from(url);
        }
        if self.token.is_some() {
            config.gitlab.token.clone_from(&self.token);
        }
        if !self.groups.is_empty() {
            config.dashboard.groups.clone_from(&self.groups);
        }
        if let Some(interval) = self.interval {
            config.dashboard.refresh_interval_secs = interval;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }

        Ok(config)
    }

    fn pin_store(&self, config: &Config) -> PinStore {
        let store: Arc<dyn KeyValueStore> = if self.no_session {
            Arc::new(MemoryStore::default())
        } else if let Some(path) = &config.storage.session_file {
            Arc::new(SessionFileStore::new(path))
        } else {
            match SessionFileStore::in_cache_dir() {
                Ok(store) => {
                    debug!("Session file: {}", store.path().display());
                    Arc::new(store)
                }
                Err(e) => {
                    warn!("Pins will not outlive this run: {e}");
                    Arc::new(MemoryStore::default())
                }
            }
        };
        PinStore::new(store)
    }

    fn session(&self, config: &Config) -> Result<Session> {
        let groups = config.dashboard.group_map();
        if groups.is_empty() {
            bail!("No groups selected: pass --group or set [dashboard] groups in the config file");
        }

        let token = config.gitlab.token.as_deref().map(Token::from);
        let provider = GitLabProvider::new(
            &config.gitlab.base_url,
            token,
            config.gitlab.pipelines_per_project,
        )
        .context("Failed to create GitLab provider")?;

        Ok(Session {
            groups,
            period: config.dashboard.refresh_interval(),
            format: config.output.format,
            provider: Arc::new(provider),
        })
    }

    pub async fn execute(&self) -> Result<()> {
        let (args, kind) = self.command.view_args();
        args.filters.validate(kind)?;

        let config = self.resolve_config()?;
        let session = self.session(&config)?;
        info!(
            "Watching {} groups on {}",
            session.groups.len(),
            config.gitlab.base_url
        );

        match &self.command {
            Commands::Latest(args) => {
                let mut view = LatestPipelinesView::new();
                view.edit_filters(|f| args.filters.apply_to(f));
                let fetcher = LatestPipelineFetcher(Arc::clone(&session.provider));
                run_view(fetcher, &mut view, args, session).await
            }
            Commands::Pipelines {
                view: args,
                pin,
                unpin,
                toggle_pin,
            } => {
                let mut view = PipelinesView::new(self.pin_store(&config));
                for id in pin {
                    view.pin(*id);
                }
                for id in unpin {
                    view.unpin(*id);
                }
                for id in toggle_pin {
                    view.toggle_pin(*id);
                }
                info!("Pinned pipelines: {:?}", view.pinned());
                view.edit_filters(|f| args.filters.apply_to(f));
                let fetcher = ProjectPipelinesFetcher(Arc::clone(&session.provider));
                run_view(fetcher, &mut view, args, session).await
            }
            Commands::Schedules(args) => {
                let mut view = SchedulesView::new();
                view.edit_filters(|f| args.filters.apply_to(f));
                let fetcher = ScheduleFetcher(Arc::clone(&session.provider));
                run_view(fetcher, &mut view, args, session).await
            }
        }
    }
}

async fn run_view<F, V>(fetcher: F, view: &mut V, args: &ViewArgs, session: Session) -> Result<()>
where
    F: GroupFetcher,
    V: Dashboard<Record = F::Record>,
{
    let downloader = args.export.as_ref().map(DirectoryDownloader::new);

    if args.watch {
        return watch_view(fetcher, view, args, downloader.as_ref(), session).await;
    }

    let spinner = LoadingSpinner::start("Fetching pipelines");
    let records = match fork_join_flatten(&session.groups, &fetcher).await {
        Ok(records) => {
            spinner.finish("Fetched pipelines");
            records
        }
        Err(e) => {
            spinner.fail("Fetching pipelines failed");
            return Err(e).context("Failed to fetch dashboard data");
        }
    };

    view.apply_snapshot(&records);

    let mut stdout = std::io::stdout().lock();
    view.render(session.format, &mut stdout)?;
    if args.options {
        print_options(view.options(), &mut stdout)?;
    }

    if let Some(downloader) = &downloader {
        view.export(downloader).context("Failed to export CSV")?;
    }

    Ok(())
}

fn print_options(options: &FilterOptions, out: &mut dyn Write) -> Result<()> {
    let lists = [
        ("Projects", &options.projects),
        ("Groups", &options.groups),
        ("Branches", &options.branches),
        ("Topics", &options.topics),
        ("Failed jobs", &options.jobs),
    ];
    for (label, values) in lists {
        writeln!(out, "{}: {}", output::dim(label), values.join(", "))?;
    }
    Ok(())
}

/// Re-renders on every snapshot and loading change until Ctrl-C.
async fn watch_view<F, V>(
    fetcher: F,
    view: &mut V,
    args: &ViewArgs,
    downloader: Option<&DirectoryDownloader>,
    session: Session,
) -> Result<()>
where
    F: GroupFetcher,
    V: Dashboard<Record = F::Record>,
{
    let handle = Poller::new(Arc::new(fetcher), session.groups, session.period).spawn();
    let mut snapshots = handle.subscribe();
    let mut loading = handle.loading();
    let term = Term::stdout();

    let mut status = DashboardStatus::default();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let mut refreshed = false;

        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                status.round = snapshot.round;
                status.fetched_at = snapshot.fetched_at;
                view.apply_snapshot(&snapshot.records);
                refreshed = true;
            }
            changed = loading.changed() => {
                if changed.is_err() {
                    break;
                }
                let is_loading = *loading.borrow_and_update();
                view.set_loading(is_loading);
            }
        }

        term.clear_screen()?;
        let mut stdout = std::io::stdout().lock();
        view.render(session.format, &mut stdout)?;
        if args.options {
            print_options(view.options(), &mut stdout)?;
        }

        status.shown = view.shown();
        status.loading = view.is_loading();
        status.filtered = !view.filters().is_empty();
        writeln!(stdout, "{}", output::dim(status.line()))?;
        drop(stdout);

        if refreshed {
            if let Some(downloader) = downloader {
                if let Err(e) = view.export(downloader) {
                    warn!("CSV export failed: {e}");
                }
            }
        }
    }

    info!("Stopping dashboard");
    handle.shutdown().await;
    Ok(())
}
