use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use awg_core::Engine;
use tracing::{info, warn};

const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Accepts subscriber connections for the status-notifier port. At most one
/// subscriber at a time; a new connection replaces the previous one (§4.5).
pub fn serve(listener: &TcpListener, engine: &Arc<Engine>, stop: &AtomicUsize) {
    listener.set_nonblocking(true).expect("notifier listener: set_nonblocking");

    while stop.load(Ordering::Relaxed) == 0 {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!(%peer, "notifier: subscriber connected");
                engine.attach_subscriber(Box::new(stream));
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                warn!(?err, "notifier: accept failed");
                std::thread::sleep(ACCEPT_POLL);
            }
        }
    }
}
