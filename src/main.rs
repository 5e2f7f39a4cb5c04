//! RustLiveCaption - Main entry point
//!
//! Device: brings up logging, NVS overrides, the ADC, the sampling timer,
//! the button interrupts and the Wi-Fi station, then starts the pipeline.
//!
//! Host: the same pipeline with a test tone for the microphone, a loopback
//! radio and a logging display. Type `select`, `scroll`, `hold-select`,
//! `hold-scroll`, `drop`, `reset` or `stats` on stdin to poke it.

use rust_live_caption::DeviceError;

#[cfg(target_os = "espidf")]
fn main() -> Result<(), DeviceError> {
    use std::time::Duration;

    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::gpio::IOPin;
    use esp_idf_svc::hal::peripherals::Peripherals as Board;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{info, warn};
    use rust_live_caption::config::nvs;
    use rust_live_caption::display::LogDisplay;
    use rust_live_caption::hal::{ButtonInputs, EspSamplingTimer, EspStation, MicAdc};
    use rust_live_caption::{Device, DeviceConfig, Peripherals};

    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    info!("{}", env!("VERSION_STRING"));

    let platform = |e: esp_idf_svc::sys::EspError| DeviceError::Platform(e.to_string());
    let board = Board::take().map_err(platform)?;
    let sysloop = EspSystemEventLoop::take().map_err(platform)?;
    let nvs_partition = EspDefaultNvsPartition::take().map_err(platform)?;

    let mut config = DeviceConfig::default();
    match nvs::load_overrides(nvs_partition.clone(), &mut config) {
        Ok(result) => info!("NVS overrides: {:?}", result),
        Err(e) => warn!("NVS overrides not applied: {:?}, using defaults", e),
    }

    let device = Device::new(config)?;
    let cfg = device.config().clone();

    let mic = MicAdc::new(board.adc1, board.pins.gpio34, device.stats().clone()).map_err(platform)?;
    let timer = EspSamplingTimer::new(
        device.ring().clone(),
        Box::new(mic),
        cfg.sample_period(),
    )?;
    let _buttons = ButtonInputs::new(
        board.pins.gpio25.downgrade(),
        board.pins.gpio26.downgrade(),
        device.latch().clone(),
    )
    .map_err(platform)?;
    let wifi = EspStation::new(board.modem, sysloop, Some(nvs_partition), &cfg)?;

    let running = device.start(Peripherals {
        timer: Box::new(timer),
        wifi: Box::new(wifi),
        display: Box::new(LogDisplay::new()),
    })?;

    if !running.link().wait_connected(Duration::from_secs(30)) {
        warn!("Wi-Fi not up yet ({:?}), captions start once it is", running.link().state());
    }

    running.wait();
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn main() -> Result<(), DeviceError> {
    use std::io::BufRead;
    use std::time::{Duration, Instant};

    use log::{info, warn};
    use rust_live_caption::audio::ToneSource;
    use rust_live_caption::config::nvs;
    use rust_live_caption::display::LogDisplay;
    use rust_live_caption::input::Button;
    use rust_live_caption::link::{LinkEvent, LoopbackWifi};
    use rust_live_caption::timer::ThreadTimer;
    use rust_live_caption::{Device, DeviceConfig, Peripherals};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("{}", env!("VERSION_STRING"));

    let mut config = DeviceConfig::default();
    if let Err(e) = nvs::load_overrides(&mut config) {
        info!("NVS overrides: {:?}", e);
    }
    let device = Device::new(config)?;
    let cfg = device.config().clone();
    let latch = device.latch().clone();

    let timer = ThreadTimer::new(
        device.ring().clone(),
        Box::new(ToneSource::new(1000, cfg.sample_rate_hz)),
        cfg.sample_period(),
    );
    let running = device.start(Peripherals {
        timer: Box::new(timer),
        wifi: Box::new(LoopbackWifi::new()),
        display: Box::new(LogDisplay::new()),
    })?;

    let started = Instant::now();
    let now_us = || started.elapsed().as_micros() as u64;
    let press = |button: Button, hold: Duration| {
        latch.on_edge(button, true, now_us());
        std::thread::sleep(hold);
        latch.on_edge(button, false, now_us());
    };
    let long = Duration::from_micros(cfg.gesture.long_press_us);
    let short = Duration::from_micros(cfg.gesture.debounce_us * 2);

    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        match line.trim() {
            "select" => press(Button::Select, short),
            "scroll" => press(Button::Scroll, short),
            "hold-select" => press(Button::Select, long),
            "hold-scroll" => press(Button::Scroll, long),
            "drop" => {
                running.post_event(LinkEvent::LinkLost);
            }
            "reset" => running.reset_link(),
            "stats" => info!("{}", running.stats().snapshot()),
            "quit" | "exit" => break,
            "" => {}
            other => warn!("Unknown command: {}", other),
        }
        // Let the debounce window pass before the next command.
        std::thread::sleep(short);
    }

    running.shutdown();
    Ok(())
}
