mod protocol;

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use awg_core::{Engine, ListState};
use tracing::{debug, info, warn};

pub use protocol::Command;

const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Default per-read timeout for the queued control stream.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the queued server's accept loop until `stop` becomes non-zero.
/// Single-writer: a new connection replaces any currently active one.
pub fn serve(listener: &TcpListener, engine: &Arc<Engine>, timeout: Duration, stop: &AtomicUsize) {
    listener.set_nonblocking(true).expect("queued listener: set_nonblocking");

    while stop.load(Ordering::Relaxed) == 0 {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!(%peer, "queued: connection accepted");
                if let Err(err) = stream.set_read_timeout(Some(timeout)) {
                    warn!(%peer, ?err, "queued: failed to set read timeout, dropping connection");
                    continue;
                }
                handle_connection(stream, engine);
                info!(%peer, "queued: connection closed");
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                warn!(?err, "queued: accept failed");
                std::thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

/// Tracks, for the lifetime of one connection, which list (if any) this
/// connection has an in-progress preload on, so it can be rolled back to
/// `Idle` if the connection drops or a protocol error cuts it short.
fn handle_connection(mut stream: TcpStream, engine: &Arc<Engine>) {
    let mut loading: Option<u8> = None;

    loop {
        let command = match protocol::read_command(&mut stream) {
            Ok(Some(command)) => command,
            Ok(None) => break, // clean close between records
            Err(err) => {
                warn!(?err, "queued: protocol error, dropping connection");
                break;
            }
        };

        if !apply(&command, engine, &mut loading) {
            break;
        }
    }

    if let Some(list_id) = loading {
        if engine.list_state(list_id) == ListState::Loading {
            debug!(list_id, "queued: rolling back in-progress preload on disconnect");
            engine.cancel_preload(list_id);
        }
    }
}

/// Apply one decoded command to the engine. Returns `false` if the
/// connection must be dropped (a validation failure the protocol layer
/// could not already reject while decoding).
fn apply(command: &Command, engine: &Arc<Engine>, loading: &mut Option<u8>) -> bool {
    match *command {
        Command::PreloadBegin { list_id, total_frames } => {
            match engine.preload_begin(list_id, total_frames) {
                Ok(()) => {
                    *loading = Some(list_id);
                    true
                }
                Err(err) => {
                    warn!(list_id, total_frames, ?err, "queued: preload_begin rejected");
                    false
                }
            }
        }
        Command::PreloadPush { list_id, ref words } => match engine.preload_push(list_id, words) {
            Ok(()) => {
                if engine.list_state(list_id) == ListState::Ready {
                    *loading = None;
                }
                true
            }
            Err(err) => {
                warn!(list_id, ?err, "queued: preload_push rejected");
                false
            }
        },
        Command::PreloadEnd { list_id } => match engine.preload_end(list_id) {
            Ok(()) => {
                *loading = None;
                true
            }
            Err(err) => {
                warn!(list_id, ?err, "queued: preload_end rejected");
                false
            }
        },
        Command::Reset => {
            info!("queued: reset requested");
            engine.reset();
            *loading = None;
            true
        }
        Command::Shutdown => {
            // §9 Open Question: the host-poweroff variant is disabled by
            // default. Treated as a Reset, matching the spec's "may be
            // treated as not exposed in a clean implementation".
            info!("queued: shutdown opcode received, executing reset only");
            engine.reset();
            *loading = None;
            true
        }
    }
}
