//! Module: device
//!
//! Purpose: Owning context that wires the pipeline together and runs its tasks.
//!
//! Architecture:
//! ```text
//! sampling timer ──push──▶ SampleRing ──▶ StreamingTask ──FIR──▶ LinkManager::send_samples
//! button ISR ──▶ ButtonLatch ──▶ InputTask ──▶ AppState ──┬──▶ timer start/stop
//!                                                         ├──▶ LinkManager::send_command
//!                                                         └──▶ DisplayTask (mpsc)
//! inbound listener ──▶ Mailbox ─────────────────────────────────▶ DisplayTask
//! Wi-Fi driver ──LinkEvent (mpsc)──▶ link task ──▶ LinkManager::handle_event
//! ```
//!
//! - Everything shared is created once in [`Device::new`] and handed to each
//!   task by `Arc`; there are no globals
//! - Allocation failure in `new` is the only start-up abort
//! - Task loops log their errors and keep going
//!
//! Safety: Safe. No unsafe blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::DeviceConfig;
use crate::display::{Display, Screen};
use crate::error::DeviceError;
use crate::fir::FirFilter;
use crate::input::{AppState, ButtonLatch, MenuEffect, Settings, Transition};
use crate::link::{LinkEvent, LinkManager, LinkState, Mailbox, WifiDriver};
use crate::sample::{Sample, SampleDatagram};
use crate::stats::PipelineStats;
use crate::stream::SampleRing;
use crate::timer::SamplingTimer;

/// Idle sleep for the streaming task when a chunk is not complete yet.
const STREAM_IDLE: Duration = Duration::from_millis(1);

/// Input task poll period.
const INPUT_POLL: Duration = Duration::from_millis(20);

/// Display task wake-up period when nothing is queued.
const DISPLAY_POLL: Duration = Duration::from_millis(500);

/// Stack for each pipeline task. Host threads get room for the test harness.
pub(crate) const TASK_STACK: usize = if cfg!(target_os = "espidf") {
    8 * 1024
} else {
    256 * 1024
};

/// Platform pieces the device drives but does not own the logic of.
pub struct Peripherals {
    pub timer: Box<dyn SamplingTimer>,
    pub wifi: Box<dyn WifiDriver>,
    pub display: Box<dyn Display>,
}

/// Shared pipeline state, built before any task starts.
pub struct Device {
    config: Arc<DeviceConfig>,
    ring: Arc<SampleRing>,
    latch: Arc<ButtonLatch>,
    mailbox: Arc<Mailbox>,
    stats: Arc<PipelineStats>,
    link: Arc<LinkManager>,
    events_tx: Sender<LinkEvent>,
    events_rx: Receiver<LinkEvent>,
    streaming: StreamingTask,
    app: AppState,
}

impl Device {
    /// Validate `config` and allocate every buffer the pipeline needs.
    pub fn new(config: DeviceConfig) -> Result<Self, DeviceError> {
        config.validate()?;
        let config = Arc::new(config);

        let ring = Arc::new(SampleRing::with_capacity(config.ring_capacity)?);
        let latch = Arc::new(ButtonLatch::new(config.gesture));
        let mailbox = Arc::new(Mailbox::new());
        let stats = Arc::new(PipelineStats::new());
        let link = Arc::new(LinkManager::new(&config, Arc::clone(&mailbox), Arc::clone(&stats))?);
        let (events_tx, events_rx) = mpsc::channel();

        let streaming = StreamingTask::new(&config, Arc::clone(&ring), Arc::clone(&link), Arc::clone(&stats))?;
        let settings = Settings::new(config.languages.clone(), config.font_sizes.clone())?;

        info!(
            "Pipeline ready: {} Hz, chunk {}, ring {}",
            config.sample_rate_hz, config.chunk_size, config.ring_capacity
        );

        Ok(Self {
            config,
            ring,
            latch,
            mailbox,
            stats,
            link,
            events_tx,
            events_rx,
            streaming,
            app: AppState::new(settings),
        })
    }

    pub fn config(&self) -> &Arc<DeviceConfig> {
        &self.config
    }

    /// Ring the sampling timer must push into.
    pub fn ring(&self) -> &Arc<SampleRing> {
        &self.ring
    }

    /// Latch the button interrupt must report edges to.
    pub fn latch(&self) -> &Arc<ButtonLatch> {
        &self.latch
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    pub fn link(&self) -> &Arc<LinkManager> {
        &self.link
    }

    /// Spawn the link, streaming, input and display tasks.
    ///
    /// Starts with power off, menu closed, sampling running and the link
    /// associating.
    pub fn start(self, peripherals: Peripherals) -> Result<RunningDevice, DeviceError> {
        let Peripherals {
            mut timer,
            mut wifi,
            display,
        } = peripherals;
        let stop = Arc::new(AtomicBool::new(false));
        let mut tasks = Vec::new();

        // Link task first so Start is handled as soon as it is queued.
        {
            let link = Arc::clone(&self.link);
            let events_tx = self.events_tx.clone();
            let events_rx = self.events_rx;
            let stop = Arc::clone(&stop);
            tasks.push(spawn("link", move || {
                if let Err(e) = wifi.start(events_tx) {
                    error!(target: "link", "Wi-Fi start failed: {}", e);
                }
                link.run_events(events_rx, wifi.as_mut(), &stop);
            })?);
        }
        if self.events_tx.send(LinkEvent::Start).is_err() {
            warn!(target: "link", "Link task gone before start");
        }

        // Sampling runs while the menu is closed, which it is at boot.
        if let Err(e) = timer.start() {
            error!(target: "stream", "Sampling timer failed to start: {}", e);
        }

        {
            let mut streaming = self.streaming;
            let stop = Arc::clone(&stop);
            tasks.push(spawn("stream", move || streaming.run(&stop))?);
        }

        let (ui_tx, ui_rx) = mpsc::channel();
        {
            let mut input = InputTask::new(
                Arc::clone(&self.latch),
                self.app.clone(),
                timer,
                Arc::clone(&self.ring),
                Arc::clone(&self.link),
                Arc::clone(&self.stats),
                ui_tx,
            );
            let stop = Arc::clone(&stop);
            tasks.push(spawn("input", move || input.run(&stop))?);
        }
        {
            let mut shown = DisplayTask::new(
                display,
                ui_rx,
                self.app,
                Arc::clone(&self.mailbox),
                Arc::clone(&self.link),
            );
            let stop = Arc::clone(&stop);
            tasks.push(spawn("display", move || shown.run(&stop))?);
        }

        info!("Device started");
        Ok(RunningDevice {
            link: self.link,
            stats: self.stats,
            events: self.events_tx,
            stop,
            tasks,
        })
    }
}

fn spawn<F>(name: &'static str, body: F) -> Result<JoinHandle<()>, DeviceError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .stack_size(TASK_STACK)
        .spawn(body)
        .map_err(|e| DeviceError::Spawn(name, e))
}

/// Handle to a started device.
pub struct RunningDevice {
    link: Arc<LinkManager>,
    stats: Arc<PipelineStats>,
    events: Sender<LinkEvent>,
    stop: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningDevice {
    pub fn link(&self) -> &Arc<LinkManager> {
        &self.link
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Queue a link event as if the radio had reported it.
    ///
    /// Returns `false` if the link task is gone.
    pub fn post_event(&self, event: LinkEvent) -> bool {
        if self.events.send(event).is_err() {
            warn!(target: "link", "Link task not running");
            return false;
        }
        true
    }

    /// Leave `Failed` and try associating again.
    pub fn reset_link(&self) {
        if self.post_event(LinkEvent::Reset) {
            self.post_event(LinkEvent::Start);
        }
    }

    /// Block on the tasks. They only return after [`shutdown`](Self::shutdown)
    /// from another handle, so on the device this never returns.
    pub fn wait(self) {
        for task in self.tasks {
            let _ = task.join();
        }
    }

    /// Stop every task and wait for them. The inbound listener, if running,
    /// stays parked in `accept`.
    pub fn shutdown(self) {
        self.stop.store(true, Ordering::Release);
        for task in self.tasks {
            if task.join().is_err() {
                warn!("Task panicked during shutdown");
            }
        }
    }
}

/// Drains the ring into fixed-size chunks, filters and sends them.
pub struct StreamingTask {
    ring: Arc<SampleRing>,
    fir: FirFilter,
    chunk: Vec<Sample>,
    filled: usize,
    epoch: u32,
    datagram: SampleDatagram,
    link: Arc<LinkManager>,
    stats: Arc<PipelineStats>,
    stats_interval: Duration,
    last_report: Instant,
}

impl StreamingTask {
    /// Allocate the chunk and datagram buffers.
    pub fn new(
        config: &DeviceConfig,
        ring: Arc<SampleRing>,
        link: Arc<LinkManager>,
        stats: Arc<PipelineStats>,
    ) -> Result<Self, DeviceError> {
        let mut chunk = Vec::new();
        chunk
            .try_reserve_exact(config.chunk_size)
            .map_err(|_| DeviceError::Allocation {
                what: "sample chunk",
                bytes: config.chunk_size * core::mem::size_of::<Sample>(),
            })?;
        chunk.resize(config.chunk_size, 0);

        Ok(Self {
            epoch: ring.epoch(),
            ring,
            fir: FirFilter::bandpass(),
            chunk,
            filled: 0,
            datagram: SampleDatagram::with_chunk_size(config.chunk_size)?,
            link,
            stats,
            stats_interval: config.stats_interval,
            last_report: Instant::now(),
        })
    }

    /// Drain what is available. Once a chunk is complete, filter it and send it.
    ///
    /// # Returns
    ///
    /// `None` while the chunk is still filling, `Some(sent)` after a chunk
    /// was handed to the link (`sent == false` if the link dropped it).
    pub fn poll(&mut self) -> Option<bool> {
        // Timer restarted since our last poll: the partial chunk is stale.
        let epoch = self.ring.epoch();
        if epoch != self.epoch {
            self.epoch = epoch;
            self.filled = 0;
        }

        self.filled += self.ring.drain(&mut self.chunk[self.filled..]);
        if self.filled < self.chunk.len() {
            return None;
        }
        self.filled = 0;

        self.fir.filter_in_place(&mut self.chunk);
        let payload = self.datagram.encode(&self.chunk);
        Some(self.link.send_samples(payload))
    }

    pub fn run(&mut self, stop: &AtomicBool) {
        info!(target: "stream", "Audio streaming task started");
        while !stop.load(Ordering::Acquire) {
            if self.poll().is_none() {
                thread::sleep(STREAM_IDLE);
            }
            self.report_stats();
        }
    }

    fn report_stats(&mut self) {
        if self.last_report.elapsed() < self.stats_interval {
            return;
        }
        self.last_report = Instant::now();
        self.stats.set_evicted(self.ring.evicted());
        info!(target: "stream", "{}", self.stats.snapshot());
    }
}

/// Turns gestures into menu transitions and their side effects.
pub struct InputTask {
    latch: Arc<ButtonLatch>,
    app: AppState,
    timer: Box<dyn SamplingTimer>,
    ring: Arc<SampleRing>,
    link: Arc<LinkManager>,
    stats: Arc<PipelineStats>,
    ui: Sender<AppState>,
}

impl InputTask {
    pub fn new(
        latch: Arc<ButtonLatch>,
        app: AppState,
        timer: Box<dyn SamplingTimer>,
        ring: Arc<SampleRing>,
        link: Arc<LinkManager>,
        stats: Arc<PipelineStats>,
        ui: Sender<AppState>,
    ) -> Self {
        Self {
            latch,
            app,
            timer,
            ring,
            link,
            stats,
            ui,
        }
    }

    pub fn app(&self) -> &AppState {
        &self.app
    }

    pub fn timer(&self) -> &dyn SamplingTimer {
        self.timer.as_ref()
    }

    /// Resolve every pending gesture, in edge order.
    ///
    /// Returns the transitions that happened.
    pub fn poll(&mut self) -> Vec<Transition> {
        let mut gestures = self.latch.take();
        self.stats.set_gestures_dropped(self.latch.dropped());

        let mut transitions = Vec::new();
        while let Some(gesture) = gestures.pop_front() {
            debug!(target: "input", "Gesture {:?}", gesture);
            match self.app.apply(gesture) {
                MenuEffect::Ignored => continue,
                MenuEffect::Moved => {}
                MenuEffect::Transition(t) => {
                    self.apply_sampling(&t);
                    self.link.send_command(&self.app.control_command());
                    transitions.push(t);
                }
            }
            // Display task gone means nothing to draw on; keep handling input.
            let _ = self.ui.send(self.app.clone());
        }
        transitions
    }

    pub fn run(&mut self, stop: &AtomicBool) {
        info!(target: "input", "Input task started");
        while !stop.load(Ordering::Acquire) {
            self.poll();
            thread::sleep(INPUT_POLL);
        }
        if let Err(e) = self.timer.stop() {
            warn!(target: "input", "Sampling timer stop failed: {}", e);
        }
    }

    /// Menu closed: (re)start sampling from a clean ring. Menu open: stop.
    fn apply_sampling(&mut self, transition: &Transition) {
        if transition.sampling_enabled() {
            if self.timer.is_running() {
                return;
            }
            self.ring.discard_pending();
            match self.timer.start() {
                Ok(()) => info!(target: "input", "Sampling resumed"),
                Err(e) => error!(target: "input", "Sampling timer start failed: {}", e),
            }
        } else if self.timer.is_running() {
            match self.timer.stop() {
                Ok(()) => info!(target: "input", "Sampling paused"),
                Err(e) => error!(target: "input", "Sampling timer stop failed: {}", e),
            }
        }
    }
}

/// Redraws the screen on menu changes, new messages and link changes.
pub struct DisplayTask {
    display: Box<dyn Display>,
    ui: Receiver<AppState>,
    app: AppState,
    mailbox: Arc<Mailbox>,
    link: Arc<LinkManager>,
    message: String,
    shown_link: Option<LinkState>,
    dirty: bool,
}

impl DisplayTask {
    pub fn new(
        display: Box<dyn Display>,
        ui: Receiver<AppState>,
        app: AppState,
        mailbox: Arc<Mailbox>,
        link: Arc<LinkManager>,
    ) -> Self {
        Self {
            display,
            ui,
            app,
            mailbox,
            link,
            message: String::new(),
            shown_link: None,
            dirty: true,
        }
    }

    /// Wait up to `wait` for a state update, then redraw if anything changed.
    ///
    /// Returns `true` if a frame was presented.
    pub fn poll(&mut self, wait: Duration) -> bool {
        match self.ui.recv_timeout(wait) {
            Ok(app) => {
                self.app = app;
                // Only the latest state matters.
                while let Ok(app) = self.ui.try_recv() {
                    self.app = app;
                }
                self.dirty = true;
            }
            Err(RecvTimeoutError::Timeout) => {}
            // No sender left; keep the loop paced like a timeout.
            Err(RecvTimeoutError::Disconnected) => thread::sleep(wait),
        }

        if let Some(message) = self.mailbox.take() {
            info!(target: "display", "Received message");
            self.message = message;
            self.dirty = true;
        }

        let link = self.link.state();
        if self.shown_link != Some(link) {
            self.shown_link = Some(link);
            self.dirty = true;
        }

        if !self.dirty {
            return false;
        }
        self.dirty = false;
        Screen::build(&self.app, link, &self.message).render(self.display.as_mut());
        true
    }

    pub fn run(&mut self, stop: &AtomicBool) {
        info!(target: "display", "Display task started");
        while !stop.load(Ordering::Acquire) {
            self.poll(DISPLAY_POLL);
        }
    }
}
