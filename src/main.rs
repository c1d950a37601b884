use iced::widget::{button, checkbox, column, row, scrollable, text};
use iced::{Alignment, Element, Subscription, Task, Theme};
use iced_aw::Wrap;
use rfd::FileDialog;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use sample_viewer::config::ViewerConfig;
use sample_viewer::error::{FetchError, ImportError};
use sample_viewer::import::{self, ImportSummary};
use sample_viewer::resource::HandlePool;
use sample_viewer::source::{self, CatalogSource, SampleSource};
use sample_viewer::state::catalog::Catalog;
use sample_viewer::state::controller::{
    Effect, EvictTicket, ImageTicket, ListTicket, SampleViewController, TimerTicket,
};
use sample_viewer::state::data::{DecodedImage, ImageKey, Session, StepRecord};
use sample_viewer::ui;

/// Identifies a chart for the lifetime of the app, even across reloads
type ChartId = u64;

struct Chart {
    id: ChartId,
    controller: SampleViewController,
}

/// Main application state
struct SampleViewer {
    config: ViewerConfig,
    /// Where the config is saved; `None` if no config directory exists
    config_path: Option<PathBuf>,
    db_path: PathBuf,
    source: Arc<dyn SampleSource>,
    /// Display handles of every chart
    pool: HandlePool,
    charts: Vec<Chart>,
    next_chart_id: ChartId,
    /// Poll step lists while a run is still writing samples
    running: bool,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// User clicked the "Import Log Directory" button
    ImportLogdir,
    /// Background import finished
    ImportComplete(Result<ImportSummary, ImportError>),
    SessionsLoaded(Result<Vec<Session>, FetchError>),
    ToggleRunning(bool),
    ToggleFit(bool),
    PollTick,
    StepListLoaded {
        chart: ChartId,
        ticket: ListTicket,
        result: Result<Vec<StepRecord>, FetchError>,
    },
    StepChanged {
        chart: ChartId,
        step: usize,
    },
    StepCommitted {
        chart: ChartId,
    },
    DebounceElapsed {
        chart: ChartId,
        ticket: TimerTicket,
    },
    ImageLoaded {
        chart: ChartId,
        ticket: ImageTicket,
        key: ImageKey,
        result: Result<Arc<DecodedImage>, FetchError>,
    },
    EvictionDue {
        chart: ChartId,
        ticket: EvictTicket,
    },
}

impl SampleViewer {
    fn new() -> (Self, Task<Message>) {
        let config_path = match ViewerConfig::default_path() {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!(error = %err, "settings will not be saved");
                None
            }
        };
        let config = config_path
            .as_deref()
            .map(|path| {
                ViewerConfig::load(path).unwrap_or_else(|err| {
                    tracing::warn!(error = %err, "using default settings");
                    ViewerConfig::default()
                })
            })
            .unwrap_or_default();

        let db_path = Catalog::default_path().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "storing the catalog in the working directory");
            PathBuf::from("samples.db")
        });

        let status = match Catalog::open(&db_path).and_then(|catalog| {
            catalog.prune_missing()?;
            catalog.sample_count()
        }) {
            Ok(count) => {
                tracing::info!(count, path = %db_path.display(), "🎨 sample viewer initialized");
                format!("Ready. {} samples in catalog.", count)
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to open the sample catalog");
                format!("⚠️ Catalog unavailable: {}", err)
            }
        };

        let viewer = SampleViewer {
            running: config.running,
            config,
            config_path,
            source: Arc::new(CatalogSource::new(db_path.clone())),
            db_path,
            pool: HandlePool::new(),
            charts: Vec::new(),
            next_chart_id: 0,
            status,
        };
        let load = viewer.load_sessions();
        (viewer, load)
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        let now = Instant::now();
        match message {
            Message::ImportLogdir => {
                let mut dialog = FileDialog::new().set_title("Select Log Directory");
                if let Some(previous) = &self.config.logdir {
                    dialog = dialog.set_directory(previous);
                }
                let folder = dialog.pick_folder();

                if let Some(folder) = folder {
                    self.status = format!("Importing from {}...", folder.display());
                    self.config.logdir = Some(folder.clone());
                    self.save_config();
                    return Task::perform(
                        import::import_logdir(folder, self.db_path.clone()),
                        Message::ImportComplete,
                    );
                }
                Task::none()
            }
            Message::ImportComplete(Ok(summary)) => {
                self.status = format!(
                    "✅ Import complete! Added {} samples, skipped {} duplicates.",
                    summary.imported, summary.skipped
                );
                self.load_sessions()
            }
            Message::ImportComplete(Err(err)) => {
                tracing::error!(error = %err, "import failed");
                self.status = format!("⚠️ Import failed: {}", err);
                Task::none()
            }
            Message::SessionsLoaded(Ok(sessions)) => self.show_sessions(sessions),
            Message::SessionsLoaded(Err(err)) => {
                tracing::error!(error = %err, "failed to list sessions");
                self.status = format!("⚠️ Could not list runs: {}", err);
                Task::none()
            }
            Message::ToggleRunning(running) => {
                self.running = running;
                self.config.running = running;
                self.save_config();
                if running {
                    return self.poll();
                }
                Task::none()
            }
            Message::ToggleFit(fit) => {
                self.config.fit = fit;
                self.save_config();
                Task::none()
            }
            Message::PollTick => self.poll(),
            Message::StepListLoaded { chart, ticket, result } => {
                self.with_chart(chart, |controller| {
                    let mut effects = controller.on_step_list(ticket, result, now);
                    if controller.needs_first_paint() {
                        effects.extend(controller.commit(now));
                    }
                    effects
                })
            }
            Message::StepChanged { chart, step } => {
                self.with_chart(chart, |controller| controller.set_step(step, now))
            }
            Message::StepCommitted { chart } => {
                self.with_chart(chart, |controller| controller.commit(now))
            }
            Message::DebounceElapsed { chart, ticket } => {
                self.with_chart(chart, |controller| controller.on_debounce_elapsed(ticket, now))
            }
            Message::ImageLoaded { chart, ticket, key, result } => self.with_chart(chart, |controller| {
                controller.on_image_loaded(ticket, key, result, now);
                Vec::new()
            }),
            Message::EvictionDue { chart, ticket } => {
                self.with_chart(chart, |controller| controller.on_eviction(ticket, now))
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let now = Instant::now();

        let toolbar = row![
            button("Import Log Directory")
                .on_press(Message::ImportLogdir)
                .padding(10),
            checkbox("Running", self.running).on_toggle(Message::ToggleRunning),
            checkbox("Fit", self.config.fit).on_toggle(Message::ToggleFit),
            text(&self.status).size(14),
        ]
        .spacing(20)
        .align_y(Alignment::Center);

        let charts = self
            .charts
            .iter()
            .map(|chart| {
                let id = chart.id;
                ui::chart::sample_chart(
                    &chart.controller,
                    self.config.fit,
                    now,
                    move |step| Message::StepChanged { chart: id, step },
                    Message::StepCommitted { chart: id },
                )
            })
            .collect();

        column![
            toolbar,
            scrollable(Wrap::with_elements(charts).spacing(20.0).line_spacing(20.0)),
        ]
        .spacing(20)
        .padding(20)
        .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        if self.running {
            iced::time::every(self.config.poll_interval()).map(|_| Message::PollTick)
        } else {
            Subscription::none()
        }
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }

    fn load_sessions(&self) -> Task<Message> {
        Task::perform(
            source::fetch_sessions(Arc::clone(&self.source)),
            Message::SessionsLoaded,
        )
    }

    /// Point one chart at each session, reusing charts in place
    fn show_sessions(&mut self, sessions: Vec<Session>) -> Task<Message> {
        self.charts.truncate(sessions.len());
        let mut tasks = Vec::new();

        for (index, session) in sessions.into_iter().enumerate() {
            if index == self.charts.len() {
                self.charts.push(Chart {
                    id: self.next_chart_id,
                    controller: SampleViewController::new(
                        self.pool.clone(),
                        self.config.cache_validity(),
                        self.config.debounce(),
                    ),
                });
                self.next_chart_id += 1;
            }
            let chart = &mut self.charts[index];
            let id = chart.id;
            let effects = chart.controller.set_session(session);
            tasks.push(self.run_effects(id, effects));
        }

        tracing::info!(charts = self.charts.len(), live_handles = self.pool.live(), "charts updated");
        Task::batch(tasks)
    }

    fn poll(&self) -> Task<Message> {
        Task::batch(
            self.charts
                .iter()
                .map(|chart| self.run_effects(chart.id, chart.controller.refresh_step_list())),
        )
    }

    fn with_chart(
        &mut self,
        id: ChartId,
        f: impl FnOnce(&mut SampleViewController) -> Vec<Effect>,
    ) -> Task<Message> {
        // messages for charts removed by a reload are dropped
        let Some(chart) = self.charts.iter_mut().find(|chart| chart.id == id) else {
            return Task::none();
        };
        let effects = f(&mut chart.controller);
        self.run_effects(id, effects)
    }

    fn run_effects(&self, chart: ChartId, effects: Vec<Effect>) -> Task<Message> {
        Task::batch(effects.into_iter().map(|effect| self.run_effect(chart, effect)))
    }

    fn run_effect(&self, chart: ChartId, effect: Effect) -> Task<Message> {
        match effect {
            Effect::FetchStepList { ticket, session } => Task::perform(
                source::fetch_step_list(Arc::clone(&self.source), session),
                move |result| Message::StepListLoaded { chart, ticket, result },
            ),
            Effect::FetchImage { ticket, key } => Task::perform(
                source::fetch_image(Arc::clone(&self.source), key.clone()),
                move |result| Message::ImageLoaded { chart, ticket, key: key.clone(), result },
            ),
            Effect::StartDebounce { ticket, delay } => Task::perform(
                tokio::time::sleep(delay),
                move |()| Message::DebounceElapsed { chart, ticket },
            ),
            Effect::ScheduleEviction { ticket, delay } => Task::perform(
                tokio::time::sleep(delay),
                move |()| Message::EvictionDue { chart, ticket },
            ),
        }
    }

    fn save_config(&self) {
        if let Some(path) = &self.config_path {
            if let Err(err) = self.config.save(path) {
                tracing::warn!(error = %err, "failed to save settings");
            }
        }
    }
}

fn main() -> iced::Result {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    iced::application("Sample Viewer", SampleViewer::update, SampleViewer::view)
        .subscription(SampleViewer::subscription)
        .theme(SampleViewer::theme)
        .centered()
        .run_with(SampleViewer::new)
}
