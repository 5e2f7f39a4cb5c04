//! Link manager tests over the loopback radio and real localhost sockets

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rust_live_caption::link::{LinkEvent, LinkManager, LinkState, LoopbackWifi, Mailbox, WifiDriver};
use rust_live_caption::sample::{decode_datagram, SampleDatagram};
use rust_live_caption::stats::PipelineStats;
use rust_live_caption::DeviceConfig;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

fn config(sample_port: u16, command_port: u16) -> DeviceConfig {
    DeviceConfig {
        server: "127.0.0.1".into(),
        sample_port,
        command_port,
        inbound_port: free_port(),
        local_sample_port: 0,
        max_retries: 3,
        receive_timeout: Duration::from_millis(500),
        connect_timeout: Duration::from_millis(500),
        ..DeviceConfig::default()
    }
}

fn manager(config: &DeviceConfig) -> LinkManager {
    LinkManager::new(config, Arc::new(Mailbox::new()), Arc::new(PipelineStats::new())).unwrap()
}

/// Handle queued events until the driver stops posting.
fn pump(link: &LinkManager, events: &Receiver<LinkEvent>, wifi: &mut LoopbackWifi) {
    while let Ok(event) = events.try_recv() {
        link.handle_event(event, wifi);
    }
}

fn started(wifi: &mut LoopbackWifi) -> Receiver<LinkEvent> {
    let (tx, rx) = mpsc::channel();
    wifi.start(tx).unwrap();
    rx
}

#[test]
fn test_gives_up_after_max_retries() {
    let cfg = config(9, 9);
    let link = manager(&cfg);
    let mut wifi = LoopbackWifi::failing(u32::MAX);
    let events = started(&mut wifi);

    link.handle_event(LinkEvent::Start, &mut wifi);
    pump(&link, &events, &mut wifi);

    assert_eq!(link.state(), LinkState::Failed);
    assert_eq!(wifi.attempts(), 3);
    assert!(!link.is_connected());

    // Failed is sticky until reset.
    link.handle_event(LinkEvent::Start, &mut wifi);
    pump(&link, &events, &mut wifi);
    assert_eq!(wifi.attempts(), 3);

    link.handle_event(LinkEvent::Reset, &mut wifi);
    assert_eq!(link.state(), LinkState::Disconnected);
    assert_eq!(link.retry_count(), 0);
}

#[test]
fn test_recovers_after_transient_failures() {
    let cfg = config(9, 9);
    let link = manager(&cfg);
    let mut wifi = LoopbackWifi::failing(2);
    let events = started(&mut wifi);

    link.handle_event(LinkEvent::Start, &mut wifi);
    pump(&link, &events, &mut wifi);

    assert_eq!(link.state(), LinkState::Connected);
    assert_eq!(wifi.attempts(), 3);
    assert_eq!(link.retry_count(), 0);
}

#[test]
fn test_sends_nothing_while_down() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    let cfg = config(server.local_addr().unwrap().port(), 9);
    let link = manager(&cfg);

    assert!(!link.send_samples(&[1, 2, 3, 4]));
    assert!(!link.send_command("state:on,lang:English,font:12"));
}

#[test]
fn test_connected_link_carries_all_three_channels() {
    let samples = UdpSocket::bind("127.0.0.1:0").unwrap();
    samples.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let commands = TcpListener::bind("127.0.0.1:0").unwrap();
    let cfg = config(
        samples.local_addr().unwrap().port(),
        commands.local_addr().unwrap().port(),
    );
    let mailbox = Arc::new(Mailbox::new());
    let stats = Arc::new(PipelineStats::new());
    let link = LinkManager::new(&cfg, Arc::clone(&mailbox), Arc::clone(&stats)).unwrap();
    let mut wifi = LoopbackWifi::new();
    let events = started(&mut wifi);

    link.handle_event(LinkEvent::Start, &mut wifi);
    pump(&link, &events, &mut wifi);
    assert!(link.wait_connected(Duration::ZERO));

    // Samples: one datagram, little-endian 32-bit values.
    let mut datagram = SampleDatagram::with_chunk_size(4).unwrap();
    assert!(link.send_samples(datagram.encode(&[1, -2, 300, -4000])));
    let mut buf = [0u8; 64];
    let (n, _) = samples.recv_from(&mut buf).unwrap();
    assert_eq!(decode_datagram(&buf[..n]).collect::<Vec<_>>(), vec![1, -2, 300, -4000]);

    // Commands: one line per connection.
    assert!(link.send_command("state:on,lang:French,font:16"));
    let (peer, _) = commands.accept().unwrap();
    let mut line = String::new();
    BufReader::new(peer).read_line(&mut line).unwrap();
    assert_eq!(line, "state:on,lang:French,font:16\n");

    // Inbound text lands in the mailbox.
    let mut client = TcpStream::connect(("127.0.0.1", cfg.inbound_port)).unwrap();
    client.write_all(b"Hello there\n").unwrap();
    drop(client);

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut message = None;
    while message.is_none() && Instant::now() < deadline {
        message = mailbox.take();
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(message.as_deref(), Some("Hello there"));

    let snap = stats.snapshot();
    assert_eq!(snap.chunks_sent, 1);
    assert_eq!(snap.commands_sent, 1);
}

#[test]
fn test_link_lost_goes_offline_then_reassociates() {
    let cfg = config(9, 9);
    let link = manager(&cfg);
    let mut wifi = LoopbackWifi::new();
    let events = started(&mut wifi);

    link.handle_event(LinkEvent::Start, &mut wifi);
    pump(&link, &events, &mut wifi);
    assert!(link.is_connected());

    link.handle_event(LinkEvent::LinkLost, &mut wifi);
    assert_eq!(link.state(), LinkState::Associating);
    assert!(!link.is_connected());
    assert!(!link.send_samples(&[0; 4]));

    pump(&link, &events, &mut wifi);
    assert_eq!(link.state(), LinkState::Connected);
    assert_eq!(wifi.attempts(), 2);
}

#[test]
fn test_wait_connected_from_another_thread() {
    let cfg = config(9, 9);
    let link = Arc::new(manager(&cfg));
    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let task = {
        let link = Arc::clone(&link);
        let stop = Arc::clone(&stop);
        let tx = tx.clone();
        thread::spawn(move || {
            let mut wifi = LoopbackWifi::new();
            wifi.start(tx).unwrap();
            link.run_events(rx, &mut wifi, &stop);
        })
    };

    tx.send(LinkEvent::Start).unwrap();
    assert!(link.wait_connected(Duration::from_secs(2)));

    stop.store(true, Ordering::Release);
    task.join().unwrap();
}

#[test]
fn test_wait_connected_returns_early_on_failure() {
    let cfg = config(9, 9);
    let link = Arc::new(manager(&cfg));
    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel();

    let task = {
        let link = Arc::clone(&link);
        let stop = Arc::clone(&stop);
        let tx = tx.clone();
        thread::spawn(move || {
            let mut wifi = LoopbackWifi::failing(u32::MAX);
            wifi.start(tx).unwrap();
            link.run_events(rx, &mut wifi, &stop);
        })
    };

    let started = Instant::now();
    tx.send(LinkEvent::Start).unwrap();
    assert!(!link.wait_connected(Duration::from_secs(10)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(link.state(), LinkState::Failed);

    stop.store(true, Ordering::Release);
    task.join().unwrap();
}

#[test]
fn test_mailbox_keeps_only_latest() {
    let mailbox = Mailbox::new();
    mailbox.post("A");
    mailbox.post("B");
    assert_eq!(mailbox.take().as_deref(), Some("B"));
    assert_eq!(mailbox.take(), None);
}

#[test]
fn test_inbound_reaccepts_after_idle_peer_times_out() {
    let cfg = DeviceConfig {
        receive_timeout: Duration::from_millis(200),
        ..config(9, 9)
    };
    let mailbox = Arc::new(Mailbox::new());
    let link = LinkManager::new(&cfg, Arc::clone(&mailbox), Arc::new(PipelineStats::new())).unwrap();
    let mut wifi = LoopbackWifi::new();
    let events = started(&mut wifi);
    link.handle_event(LinkEvent::Start, &mut wifi);
    pump(&link, &events, &mut wifi);
    assert!(link.is_connected());

    // First peer says nothing and is dropped by the receive timeout.
    let idle = TcpStream::connect(("127.0.0.1", cfg.inbound_port)).unwrap();
    thread::sleep(Duration::from_millis(50));

    let mut second = TcpStream::connect(("127.0.0.1", cfg.inbound_port)).unwrap();
    second.write_all(b"second\n").unwrap();
    drop(second);

    let deadline = Instant::now() + Duration::from_secs(3);
    let mut message = None;
    while message.is_none() && Instant::now() < deadline {
        message = mailbox.take();
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(message.as_deref(), Some("second"));
    assert_eq!(link.state(), LinkState::Connected);
    assert!(link.is_connected());
    drop(idle);
}

#[test]
fn test_refused_command_counts_failure_and_keeps_link() {
    let cfg = config(9, free_port());
    let stats = Arc::new(PipelineStats::new());
    let link = LinkManager::new(&cfg, Arc::new(Mailbox::new()), Arc::clone(&stats)).unwrap();
    let mut wifi = LoopbackWifi::new();
    let events = started(&mut wifi);
    link.handle_event(LinkEvent::Start, &mut wifi);
    pump(&link, &events, &mut wifi);
    assert!(link.is_connected());

    assert!(!link.send_command("state:on,lang:English,font:12"));

    let snap = stats.snapshot();
    assert_eq!(snap.send_failures, 1);
    assert_eq!(snap.commands_sent, 0);
    assert_eq!(link.state(), LinkState::Connected);
    assert!(link.is_connected());
}
