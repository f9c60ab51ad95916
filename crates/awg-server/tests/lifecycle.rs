use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use awg_core::Engine;
use awg_hw::Hw;
use awg_hw::fake::FakeHwBackend;
use awg_server::config::{Args, Config};
use clap::Parser;

fn ephemeral_config() -> Config {
    // Port 0 asks the OS for any free port; a real deployment always pins
    // explicit ports, but tests need to run concurrently without clashing.
    Config::resolve(Args::parse_from([
        "awg-server",
        "--queued-port",
        "0",
        "--direct-port",
        "0",
        "--notifier-port",
        "0",
        "--period-us",
        "1000",
        "--flush-frames",
        "3",
    ]))
}

#[test]
fn lifecycle_startup_primes_lists_and_serves_until_signalled() {
    let (backend, events) = FakeHwBackend::new();
    let engine = Arc::new(Engine::new(Hw::from_backend(Box::new(backend)), Duration::from_millis(1)));
    let config = ephemeral_config();

    // lifecycle::run blocks until a stop signal arrives; since the test
    // doesn't send one, drive it on its own thread and just confirm the
    // priming step (which runs before it ever blocks) completed.
    let config_for_thread = config.clone();
    std::thread::spawn(move || {
        awg_server::lifecycle::run(engine, &config_for_thread);
    });

    std::thread::sleep(Duration::from_millis(200));

    // Each primed list emits flush_frames * 17-word zero-gain frames; with
    // two lists primed in sequence at startup, at least one full zero-gain
    // frame (ending in COMMIT) must already be on the wire.
    let words = events.words();
    assert!(!words.is_empty(), "priming should have sent zero-gain frames to hardware");
    assert_eq!(*words.last().unwrap(), awg_hw::CommandWord::commit().0);
}

#[test]
fn queued_and_notifier_ports_are_reachable_after_startup() {
    let (backend, _events) = FakeHwBackend::new();
    let engine = Arc::new(Engine::new(Hw::from_backend(Box::new(backend)), Duration::from_micros(200)));
    let config = ephemeral_config();

    // Discover the bound ports by asking the OS for two free ports up
    // front, since `lifecycle::run` binds internally and doesn't return
    // them. Rebuild config with fixed ports instead of 0.
    let queued_port = free_port();
    let notifier_port = free_port();
    let direct_port = free_port();
    let config = Config { queued_port, notifier_port, direct_port, ..config };

    std::thread::spawn(move || {
        awg_server::lifecycle::run(engine, &config);
    });
    std::thread::sleep(Duration::from_millis(300));

    let subscriber = TcpStream::connect(("127.0.0.1", notifier_port)).expect("notifier port should be listening");
    let mut lines = BufReader::new(subscriber).lines();
    assert_eq!(lines.next().unwrap().unwrap(), "LIST0:IDLE");
    assert_eq!(lines.next().unwrap().unwrap(), "LIST1:IDLE");

    let mut queued = TcpStream::connect(("127.0.0.1", queued_port)).expect("queued port should be listening");
    queued.write_all(&[b'Z']).unwrap(); // Reset: exercised end-to-end, not asserted on here
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}
