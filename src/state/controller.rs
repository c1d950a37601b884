/// Per-chart controller for one (run, tag) sample series
///
/// Owns the step cache, the scrub state machine and the displayed image.
/// Every operation returns the effects the host has to run (fetches and
/// timers); their completions come back with the ticket they were issued
/// with. Tickets carry the session generation, so anything issued before
/// a session change is ignored when it completes.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use iced::widget::image::Handle;

use super::cache::{EvictionTicket, StepCache};
use super::data::{DecodedImage, ImageKey, Session, StepRecord};
use super::scrub::{DebounceToken, ResolveTicket, ScrubController, ScrubDecision};
use crate::error::FetchError;
use crate::resource::{HandlePool, ImageSlot};

/// Issued with a step list fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListTicket {
    generation: u64,
}

/// Issued with an image fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTicket {
    generation: u64,
    resolve: ResolveTicket,
    pub step_index: usize,
}

/// Issued with a debounce timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTicket {
    generation: u64,
    token: DebounceToken,
}

/// Issued with a deferred cache eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictTicket {
    generation: u64,
    eviction: EvictionTicket,
}

/// Work the host must carry out on behalf of a controller
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchStepList { ticket: ListTicket, session: Session },
    FetchImage { ticket: ImageTicket, key: ImageKey },
    StartDebounce { ticket: TimerTicket, delay: Duration },
    ScheduleEviction { ticket: EvictTicket, delay: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Loading,
    Error,
    Empty,
    Ready,
}

/// What the view should render for a chart
#[derive(Debug)]
pub struct Display<'a> {
    pub status: Status,
    pub image: Option<&'a Handle>,
    /// Step record of the requested step, once the list is known
    pub record: Option<StepRecord>,
    /// Set for `Error`, and for `Ready` when an older image stands in
    /// for a step that failed to load
    pub error: Option<&'a FetchError>,
}

/// Interaction surface for the step slider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliderModel {
    pub current: usize,
    pub min: usize,
    pub max: usize,
}

#[derive(Debug)]
enum StepList {
    Pending,
    Failed(FetchError),
    Loaded(Vec<StepRecord>),
}

#[derive(Debug)]
pub struct SampleViewController {
    session: Option<Session>,
    generation: u64,
    steps: StepList,
    cache: StepCache<ImageKey>,
    scrub: ScrubController,
    /// Decoded payloads of cached steps
    payloads: HashMap<usize, (ImageKey, Arc<DecodedImage>)>,
    /// Latest image fetch issued per step
    in_flight: HashMap<usize, ResolveTicket>,
    /// Steps with an eviction timer outstanding; at most one per step
    eviction_armed: HashSet<usize>,
    failed: Option<(usize, FetchError)>,
    /// A step was requested before the step list arrived
    deferred_request: bool,
    slot: ImageSlot,
}

impl SampleViewController {
    pub fn new(pool: HandlePool, validity: Duration, debounce: Duration) -> Self {
        Self {
            session: None,
            generation: 0,
            steps: StepList::Pending,
            cache: StepCache::new(validity),
            scrub: ScrubController::new(debounce),
            payloads: HashMap::new(),
            in_flight: HashMap::new(),
            eviction_armed: HashSet::new(),
            failed: None,
            deferred_request: false,
            slot: ImageSlot::new(pool),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn cache(&self) -> &StepCache<ImageKey> {
        &self.cache
    }

    pub fn scrub(&self) -> &ScrubController {
        &self.scrub
    }

    pub fn step_records(&self) -> &[StepRecord] {
        match &self.steps {
            StepList::Loaded(list) => list,
            _ => &[],
        }
    }

    /// Switch to another (run, tag); a no-op for the current one
    pub fn set_session(&mut self, session: Session) -> Vec<Effect> {
        if self.session.as_ref() == Some(&session) {
            return Vec::new();
        }

        self.generation += 1;
        self.cache.clear();
        self.scrub.reset();
        self.payloads.clear();
        self.in_flight.clear();
        self.eviction_armed.clear();
        self.failed = None;
        self.deferred_request = false;
        self.slot.clear();
        self.steps = StepList::Pending;

        tracing::info!(session = %session, generation = self.generation, "opened sample session");
        self.session = Some(session);
        self.refresh_step_list()
    }

    /// Ask for the step list again (polling while a run is in progress)
    pub fn refresh_step_list(&self) -> Vec<Effect> {
        match &self.session {
            Some(session) => vec![Effect::FetchStepList {
                ticket: ListTicket { generation: self.generation },
                session: session.clone(),
            }],
            None => Vec::new(),
        }
    }

    pub fn on_step_list(
        &mut self,
        ticket: ListTicket,
        result: Result<Vec<StepRecord>, FetchError>,
        now: Instant,
    ) -> Vec<Effect> {
        if ticket.generation != self.generation {
            tracing::debug!("discarding step list of a previous session");
            return Vec::new();
        }

        match result {
            Ok(list) => {
                let refreshed = matches!(self.steps, StepList::Loaded(_));
                let has_steps = !list.is_empty();
                self.steps = StepList::Loaded(list);
                let step = self.clamp_step(self.scrub.requested_step());

                if std::mem::take(&mut self.deferred_request) {
                    return self.dispatch(step, now);
                }
                // a refresh re-runs the step decision, retrying a failed load
                if refreshed
                    && has_steps
                    && !self.in_flight.contains_key(&step)
                    && !self.scrub.has_pending_timer()
                {
                    return self.dispatch(step, now);
                }
                Vec::new()
            }
            Err(err) => {
                if let StepList::Loaded(_) = self.steps {
                    tracing::warn!(error = %err, "step list refresh failed, keeping previous list");
                } else {
                    tracing::warn!(error = %err, "step list fetch failed");
                    self.steps = StepList::Failed(err);
                }
                Vec::new()
            }
        }
    }

    /// True once steps are known but nothing has been resolved yet
    pub fn needs_first_paint(&self) -> bool {
        !self.step_records().is_empty()
            && self.cache.is_empty()
            && self.slot.current().is_none()
            && self.failed.is_none()
            && self.in_flight.is_empty()
    }

    /// Slider moved to `step`
    pub fn set_step(&mut self, step: usize, now: Instant) -> Vec<Effect> {
        let step = self.clamp_step(step);
        self.dispatch(step, now)
    }

    /// Slider released: resolve the requested step right away
    pub fn commit(&mut self, now: Instant) -> Vec<Effect> {
        let step = self.scrub.commit();
        self.resolve(step, now)
    }

    pub fn on_debounce_elapsed(&mut self, ticket: TimerTicket, now: Instant) -> Vec<Effect> {
        if ticket.generation != self.generation {
            return Vec::new();
        }
        match self.scrub.timer_elapsed(ticket.token) {
            Some(step) => self.resolve(step, now),
            None => Vec::new(),
        }
    }

    pub fn on_image_loaded(
        &mut self,
        ticket: ImageTicket,
        key: ImageKey,
        result: Result<Arc<DecodedImage>, FetchError>,
        now: Instant,
    ) {
        let step = ticket.step_index;
        if ticket.generation != self.generation
            || self.in_flight.get(&step) != Some(&ticket.resolve)
        {
            tracing::debug!(step, "discarding superseded image load");
            return;
        }
        self.in_flight.remove(&step);
        self.scrub.finish_resolve(ticket.resolve);

        if self.cache.get(step, now).map(|entry| &entry.resource_ref) != Some(&key) {
            tracing::debug!(step, "image arrived for an evicted or replaced entry");
            return;
        }

        match result {
            Ok(payload) => {
                self.payloads.insert(step, (key, payload));
                self.sync_display(now);
            }
            Err(err) => {
                tracing::warn!(step, error = %err, "failed to load sample image");
                self.cache.remove(step);
                self.payloads.remove(&step);
                self.failed = Some((step, err));
            }
        }
    }

    /// A scheduled eviction is due; re-arms itself if the entry was
    /// refreshed in the meantime
    pub fn on_eviction(&mut self, ticket: EvictTicket, now: Instant) -> Vec<Effect> {
        if ticket.generation != self.generation {
            return Vec::new();
        }
        let step = ticket.eviction.step_index;
        self.eviction_armed.remove(&step);

        if let Some(key) = self.cache.evict(ticket.eviction, now) {
            if self.payloads.get(&step).is_some_and(|(cached, _)| *cached == key) {
                self.payloads.remove(&step);
            }
            tracing::debug!(step, "evicted expired sample");
            return Vec::new();
        }
        match self.cache.ticket(step) {
            Some(eviction) => self.schedule_eviction(eviction, now).into_iter().collect(),
            None => Vec::new(),
        }
    }

    pub fn current_display(&self, now: Instant) -> Display<'_> {
        let list = match &self.steps {
            StepList::Pending => return Display::without_image(Status::Loading, None, None),
            StepList::Failed(err) => return Display::without_image(Status::Error, None, Some(err)),
            StepList::Loaded(list) => list,
        };
        if list.is_empty() {
            return Display::without_image(Status::Empty, None, None);
        }

        let step = self.scrub.requested_step();
        let record = list.get(step).copied();
        let shown = self.slot.current().and_then(|resource| resource.handle());

        if let Some((failed_step, err)) = &self.failed {
            if *failed_step == step {
                return match shown {
                    Some(handle) => Display {
                        status: Status::Ready,
                        image: Some(handle),
                        record,
                        error: Some(err),
                    },
                    None => Display::without_image(Status::Error, record, Some(err)),
                };
            }
        }

        match self.cache.get(step, now) {
            Some(entry) if self.slot.shows(&entry.resource_ref) => Display {
                status: Status::Ready,
                image: shown,
                record,
                error: None,
            },
            _ => Display::without_image(Status::Loading, record, None),
        }
    }

    pub fn slider(&self) -> SliderModel {
        SliderModel {
            current: self.clamp_step(self.scrub.requested_step()),
            min: 0,
            max: self.step_records().len().saturating_sub(1),
        }
    }

    /// Keep `step` inside a loaded list; unknown lists leave it alone
    fn clamp_step(&self, step: usize) -> usize {
        match &self.steps {
            StepList::Loaded(list) => step.min(list.len().saturating_sub(1)),
            _ => step,
        }
    }

    fn dispatch(&mut self, step: usize, now: Instant) -> Vec<Effect> {
        if self.failed.as_ref().is_some_and(|(failed, _)| *failed != step) {
            self.failed = None;
        }

        let cached = self.cache.get(step, now).is_some();
        match self.scrub.request(step, cached, self.cache.is_empty()) {
            ScrubDecision::FromCache => {
                self.sync_display(now);
                Vec::new()
            }
            ScrubDecision::ResolveNow => self.resolve(step, now),
            ScrubDecision::Defer { token, delay } => vec![Effect::StartDebounce {
                ticket: TimerTicket {
                    generation: self.generation,
                    token,
                },
                delay,
            }],
        }
    }

    fn resolve(&mut self, step: usize, now: Instant) -> Vec<Effect> {
        let (Some(session), StepList::Loaded(list)) = (&self.session, &self.steps) else {
            self.deferred_request = true;
            return Vec::new();
        };
        let Some(record) = list.get(step) else {
            return Vec::new();
        };

        let key = ImageKey::new(session, step, record);
        self.failed = None;
        let (eviction, replaced) = self.cache.put(step, key.clone(), now);
        if replaced.is_some_and(|previous| previous != key) {
            self.payloads.remove(&step);
        }

        let mut effects: Vec<Effect> = self.schedule_eviction(eviction, now).into_iter().collect();

        if self.payloads.contains_key(&step) {
            self.sync_display(now);
        } else {
            let resolve = self.scrub.begin_resolve();
            self.in_flight.insert(step, resolve);
            effects.push(Effect::FetchImage {
                ticket: ImageTicket {
                    generation: self.generation,
                    resolve,
                    step_index: step,
                },
                key,
            });
        }
        effects
    }

    /// Timer for `eviction`, unless one is already outstanding for its step
    ///
    /// An outstanding timer always fires no later than a refreshed entry
    /// expires, and re-arms from `on_eviction`.
    fn schedule_eviction(&mut self, eviction: EvictionTicket, now: Instant) -> Option<Effect> {
        if !self.eviction_armed.insert(eviction.step_index) {
            return None;
        }
        Some(Effect::ScheduleEviction {
            ticket: EvictTicket {
                generation: self.generation,
                eviction,
            },
            delay: eviction.delay_from(now),
        })
    }

    /// Show the requested step's payload if it is cached and decoded
    fn sync_display(&mut self, now: Instant) {
        let step = self.scrub.requested_step();
        let Some(entry) = self.cache.get(step, now) else {
            return;
        };
        if let Some((key, payload)) = self.payloads.get(&step) {
            if *key == entry.resource_ref {
                self.slot.show(key, payload);
            }
        }
    }
}

impl<'a> Display<'a> {
    fn without_image(status: Status, record: Option<StepRecord>, error: Option<&'a FetchError>) -> Self {
        Self {
            status,
            image: None,
            record,
            error,
        }
    }
}
