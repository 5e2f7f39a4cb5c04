//! Orchestrator task tests with fake peripherals

use std::net::UdpSocket;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rust_live_caption::config::DEFAULT_LANGUAGES;
use rust_live_caption::device::{DisplayTask, InputTask, StreamingTask};
use rust_live_caption::display::{Color, Display};
use rust_live_caption::input::{AppState, Button, ButtonLatch, Menu, Power, Settings};
use rust_live_caption::link::{LinkEvent, LinkManager, LoopbackWifi, Mailbox, WifiDriver};
use rust_live_caption::stats::PipelineStats;
use rust_live_caption::stream::SampleRing;
use rust_live_caption::{DeviceConfig, DeviceError, SamplingTimer, TimerError};

#[derive(Clone, Default)]
struct TimerLog {
    starts: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
}

struct FakeTimer {
    running: bool,
    log: TimerLog,
}

impl SamplingTimer for FakeTimer {
    fn start(&mut self) -> Result<(), TimerError> {
        self.log.starts.fetch_add(1, Ordering::Relaxed);
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TimerError> {
        self.log.stops.fetch_add(1, Ordering::Relaxed);
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[derive(Clone, Default)]
struct Frames(Arc<Mutex<Vec<Vec<String>>>>);

impl Frames {
    fn last(&self) -> Vec<String> {
        self.0.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

struct RecordingDisplay {
    pending: Vec<String>,
    frames: Frames,
}

impl Display for RecordingDisplay {
    fn clear(&mut self) {
        self.pending.clear();
    }

    fn draw_text(&mut self, _x: u16, _y: u16, text: &str, _size: u8, _fg: Color, _bg: Color) {
        self.pending.push(text.to_string());
    }

    fn present(&mut self) {
        self.frames.0.lock().unwrap().push(std::mem::take(&mut self.pending));
    }
}

fn config(sample_port: u16) -> DeviceConfig {
    DeviceConfig {
        server: "127.0.0.1".into(),
        sample_port,
        command_port: 9,
        inbound_port: 0,
        local_sample_port: 0,
        chunk_size: 4,
        ring_capacity: 16,
        connect_timeout: Duration::from_millis(200),
        ..DeviceConfig::default()
    }
}

fn app() -> AppState {
    let settings = Settings::new(
        DEFAULT_LANGUAGES.iter().map(|l| l.to_string()).collect(),
        vec![8, 12, 16],
    )
    .unwrap();
    AppState::new(settings)
}

fn link(cfg: &DeviceConfig, stats: &Arc<PipelineStats>) -> Arc<LinkManager> {
    Arc::new(LinkManager::new(cfg, Arc::new(Mailbox::new()), Arc::clone(stats)).unwrap())
}

fn connect(link: &LinkManager) {
    let mut wifi = LoopbackWifi::new();
    let (tx, rx) = mpsc::channel();
    wifi.start(tx).unwrap();
    link.handle_event(LinkEvent::Start, &mut wifi);
    while let Ok(event) = rx.try_recv() {
        link.handle_event(event, &mut wifi);
    }
    assert!(link.is_connected());
}

fn press(latch: &ButtonLatch, button: Button, at_us: &mut u64, held_us: u64) {
    latch.on_edge(button, true, *at_us);
    latch.on_edge(button, false, *at_us + held_us);
    *at_us += held_us + 200_000;
}

fn drain_ui(ui: &Receiver<AppState>) -> Option<AppState> {
    ui.try_iter().last()
}

#[test]
fn test_invalid_config_rejected_before_start() {
    let cfg = DeviceConfig {
        ring_capacity: 1000,
        ..DeviceConfig::default()
    };
    assert!(matches!(
        rust_live_caption::Device::new(cfg),
        Err(DeviceError::Config(_))
    ));
}

#[test]
fn test_streaming_sends_full_chunks_only() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    server.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let cfg = config(server.local_addr().unwrap().port());
    let stats = Arc::new(PipelineStats::new());
    let link = link(&cfg, &stats);
    connect(&link);

    let ring = Arc::new(SampleRing::with_capacity(cfg.ring_capacity).unwrap());
    let mut task = StreamingTask::new(&cfg, Arc::clone(&ring), Arc::clone(&link), Arc::clone(&stats)).unwrap();

    ring.push(1);
    ring.push(2);
    assert_eq!(task.poll(), None);
    ring.push(3);
    ring.push(4);
    assert_eq!(task.poll(), Some(true));

    let mut buf = [0u8; 64];
    let (n, _) = server.recv_from(&mut buf).unwrap();
    assert_eq!(n, 4 * 4);
    assert_eq!(stats.snapshot().chunks_sent, 1);
}

#[test]
fn test_streaming_drops_partial_chunk_on_resume() {
    let cfg = config(9);
    let stats = Arc::new(PipelineStats::new());
    let link = link(&cfg, &stats);
    let ring = Arc::new(SampleRing::with_capacity(cfg.ring_capacity).unwrap());
    let mut task = StreamingTask::new(&cfg, Arc::clone(&ring), link, stats).unwrap();

    ring.push(1);
    ring.push(2);
    assert_eq!(task.poll(), None);

    ring.discard_pending();
    ring.push(3);
    ring.push(4);
    // Without the reset these two would complete the stale chunk.
    assert_eq!(task.poll(), None);

    ring.push(5);
    ring.push(6);
    // Link is down: the chunk is produced but not sent.
    assert_eq!(task.poll(), Some(false));
}

#[test]
fn test_input_task_drives_sampling_and_ui() {
    let cfg = config(9);
    let stats = Arc::new(PipelineStats::new());
    let link = link(&cfg, &stats);
    let ring = Arc::new(SampleRing::with_capacity(16).unwrap());
    let latch = Arc::new(ButtonLatch::new(cfg.gesture));
    let log = TimerLog::default();
    let timer = FakeTimer {
        running: true,
        log: log.clone(),
    };
    let (ui_tx, ui_rx) = mpsc::channel();
    let mut task = InputTask::new(
        Arc::clone(&latch),
        app(),
        Box::new(timer),
        Arc::clone(&ring),
        link,
        Arc::clone(&stats),
        ui_tx,
    );
    let mut t = 0;

    // Power on: menu stays closed, sampling untouched.
    press(&latch, Button::Select, &mut t, 1_200_000);
    assert_eq!(task.poll().len(), 1);
    assert_eq!(task.app().power(), Power::On);
    assert_eq!(log.starts.load(Ordering::Relaxed), 0);
    assert_eq!(log.stops.load(Ordering::Relaxed), 0);

    // Open the menu: sampling pauses.
    press(&latch, Button::Select, &mut t, 100_000);
    task.poll();
    assert_eq!(task.app().menu(), Menu::MainMenu);
    assert!(!task.timer().is_running());
    assert_eq!(log.stops.load(Ordering::Relaxed), 1);
    assert_eq!(drain_ui(&ui_rx).map(|a| a.menu()), Some(Menu::MainMenu));

    // Scroll only moves the highlight.
    press(&latch, Button::Scroll, &mut t, 100_000);
    assert!(task.poll().is_empty());
    assert_eq!(drain_ui(&ui_rx).map(|a| a.selection()), Some(1));

    // Font Size, then commit 8: menu closes, ring resynced, sampling back.
    press(&latch, Button::Select, &mut t, 100_000);
    press(&latch, Button::Select, &mut t, 100_000);
    let transitions = task.poll();
    assert_eq!(transitions.len(), 2);
    assert_eq!(task.app().menu(), Menu::Off);
    assert_eq!(task.app().settings().font_size(), 8);
    assert!(task.timer().is_running());
    assert_eq!(log.starts.load(Ordering::Relaxed), 1);
    assert_eq!(ring.epoch(), 1);
}

#[test]
fn test_display_redraws_only_on_change() {
    let cfg = config(9);
    let stats = Arc::new(PipelineStats::new());
    let link = link(&cfg, &stats);
    let mailbox = Arc::clone(link.mailbox());
    let frames = Frames::default();
    let display = RecordingDisplay {
        pending: Vec::new(),
        frames: frames.clone(),
    };
    let (ui_tx, ui_rx) = mpsc::channel();
    let mut task = DisplayTask::new(Box::new(display), ui_rx, app(), Arc::clone(&mailbox), link);

    assert!(task.poll(Duration::ZERO));
    assert_eq!(frames.last(), vec!["OFF | offline"]);
    assert!(!task.poll(Duration::ZERO));

    mailbox.post("Good morning");
    assert!(task.poll(Duration::ZERO));
    assert_eq!(frames.last(), vec!["OFF | offline", "Good morning"]);

    let mut menu = app();
    menu.apply(rust_live_caption::input::Gesture::Long(Button::Select));
    menu.apply(rust_live_caption::input::Gesture::Short(Button::Select));
    ui_tx.send(menu).unwrap();
    assert!(task.poll(Duration::from_millis(100)));
    assert_eq!(frames.last(), vec!["Menu", "Language", "Font Size"]);
    assert_eq!(frames.count(), 3);
}

#[test]
fn test_display_poll_paced_after_input_task_exits() {
    let cfg = config(9);
    let stats = Arc::new(PipelineStats::new());
    let link = link(&cfg, &stats);
    let mailbox = Arc::clone(link.mailbox());
    let frames = Frames::default();
    let display = RecordingDisplay {
        pending: Vec::new(),
        frames: frames.clone(),
    };
    let (ui_tx, ui_rx) = mpsc::channel::<AppState>();
    let mut task = DisplayTask::new(Box::new(display), ui_rx, app(), mailbox, link);
    assert!(task.poll(Duration::ZERO));
    drop(ui_tx);

    let started = Instant::now();
    for _ in 0..3 {
        assert!(!task.poll(Duration::from_millis(40)));
    }
    assert!(started.elapsed() >= Duration::from_millis(120));
    assert_eq!(frames.count(), 1);
}
