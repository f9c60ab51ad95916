use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use awg_core::Engine;
use tracing::{error, info, warn};

use crate::config::Config;

pub const EXIT_OK: i32 = 0;
pub const EXIT_HW_INIT_FAILED: i32 = 1;
pub const EXIT_QUEUED_BIND_FAILED: i32 = 2;
pub const EXIT_DIRECT_BIND_FAILED: i32 = 3;
pub const EXIT_NOTIFIER_BIND_FAILED: i32 = 4;

/// Run the full startup → serve → shutdown sequence against an already
/// constructed [`Engine`]. Kept separate from hardware initialisation so
/// integration tests can drive it against a `FakeHwBackend`-backed engine.
pub fn run(engine: Arc<Engine>, config: &Config) -> i32 {
    let player = engine.spawn_player(config.core_player);
    info!("lifecycle: player thread started (not yet playing)");

    engine.drain_silence(0, config.flush_frames);
    engine.drain_silence(1, config.flush_frames);
    info!("lifecycle: both lists primed with a zero-gain sequence");

    let notifier_listener = match TcpListener::bind(("0.0.0.0", config.notifier_port)) {
        Ok(listener) => listener,
        Err(err) => {
            error!(port = config.notifier_port, ?err, "lifecycle: notifier listener bind failed");
            return EXIT_NOTIFIER_BIND_FAILED;
        }
    };
    let queued_listener = match TcpListener::bind(("0.0.0.0", config.queued_port)) {
        Ok(listener) => listener,
        Err(err) => {
            error!(port = config.queued_port, ?err, "lifecycle: queued listener bind failed");
            return EXIT_QUEUED_BIND_FAILED;
        }
    };
    let direct_listener = match TcpListener::bind(("0.0.0.0", config.direct_port)) {
        Ok(listener) => listener,
        Err(err) => {
            error!(port = config.direct_port, ?err, "lifecycle: direct listener bind failed");
            return EXIT_DIRECT_BIND_FAILED;
        }
    };

    let stop = install_signal_handlers();

    let notifier_thread = spawn_notifier(notifier_listener, Arc::clone(&engine), Arc::clone(&stop));
    let queued_thread = spawn_queued(queued_listener, Arc::clone(&engine), config.queued_timeout, Arc::clone(&stop));
    let direct_thread = spawn_direct(direct_listener, Arc::clone(&engine), config.direct_timeout, Arc::clone(&stop));
    info!(
        queued_port = config.queued_port,
        direct_port = config.direct_port,
        notifier_port = config.notifier_port,
        "lifecycle: serving"
    );

    while stop.load(Ordering::Relaxed) == 0 {
        std::thread::sleep(Duration::from_millis(100));
    }
    info!("lifecycle: stop signal received, shutting down");

    join_thread("notifier", notifier_thread);
    join_thread("queued", queued_thread);
    join_thread("direct", direct_thread);

    engine.drain_silence(0, config.flush_frames);
    engine.drain_silence(1, config.flush_frames);
    info!("lifecycle: PL flush complete, both lists idle");

    drop(player); // stops and joins the player thread
    engine.shutdown_hw();
    info!("lifecycle: hardware silenced and closed");

    EXIT_OK
}

fn join_thread(name: &str, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        warn!(name, "lifecycle: accept thread panicked");
    }
}

fn spawn_notifier(listener: TcpListener, engine: Arc<Engine>, stop: Arc<AtomicUsize>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("awg-notifier".into())
        .spawn(move || awg_net::notifier::serve(&listener, &engine, &stop))
        .expect("failed to spawn notifier accept thread")
}

fn spawn_queued(listener: TcpListener, engine: Arc<Engine>, timeout: Duration, stop: Arc<AtomicUsize>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("awg-queued".into())
        .spawn(move || awg_net::serve_queued(&listener, &engine, timeout, &stop))
        .expect("failed to spawn queued accept thread")
}

fn spawn_direct(listener: TcpListener, engine: Arc<Engine>, timeout: Duration, stop: Arc<AtomicUsize>) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("awg-direct".into())
        .spawn(move || awg_net::direct::serve(&listener, &engine, timeout, &stop))
        .expect("failed to spawn direct accept thread")
}

/// SIGINT/SIGTERM/SIGQUIT all raise the same stop flag, following the
/// teacher's `ScopedSpine` pattern of one `Arc<AtomicUsize>` fed by
/// `signal_hook::flag::register_usize`. Accept loops and the shutdown
/// wait-loop above both just poll it for non-zero.
fn install_signal_handlers() -> Arc<AtomicUsize> {
    let stop = Arc::new(AtomicUsize::new(0));
    for (signal, value) in [
        (signal_hook::consts::SIGINT, signal_hook::consts::SIGINT as usize),
        (signal_hook::consts::SIGTERM, signal_hook::consts::SIGTERM as usize),
        (signal_hook::consts::SIGQUIT, signal_hook::consts::SIGQUIT as usize),
    ] {
        if let Err(err) = signal_hook::flag::register_usize(signal, Arc::clone(&stop), value) {
            warn!(signal, ?err, "lifecycle: failed to register signal handler");
        }
    }
    stop
}
