use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use awg_core::Engine;
use tracing::{debug, info, warn};

const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Default per-read timeout for direct-server connections.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Accepts concurrent connections; each is handled on its own short-lived
/// thread (§5: "ephemeral per-direct-connection threads"). Stateless per
/// §4.6: no acknowledgement, no preload interaction, shares the engine's HW
/// mutex with the player.
pub fn serve(listener: &TcpListener, engine: &Arc<Engine>, timeout: Duration, stop: &AtomicUsize) {
    listener.set_nonblocking(true).expect("direct listener: set_nonblocking");

    while stop.load(Ordering::Relaxed) == 0 {
        match listener.accept() {
            Ok((stream, peer)) => {
                info!(%peer, "direct: connection accepted");
                let engine = Arc::clone(engine);
                std::thread::spawn(move || {
                    if let Err(err) = stream.set_read_timeout(Some(timeout)) {
                        warn!(%peer, ?err, "direct: failed to set read timeout");
                        return;
                    }
                    handle_connection(stream, &engine);
                    info!(%peer, "direct: connection closed");
                });
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                warn!(?err, "direct: accept failed");
                std::thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

fn handle_connection(mut stream: TcpStream, engine: &Arc<Engine>) {
    loop {
        match read_frame(&mut stream) {
            Ok(Some(words)) => {
                debug!(n_words = words.len(), "direct: forwarding frame to hardware");
                engine.send_direct(&words);
            }
            Ok(None) => break,
            Err(err) => {
                warn!(?err, "direct: read error, dropping connection");
                break;
            }
        }
    }
}

/// `u16 count` (1..64) then `count * u32` words, all big-endian. Returns
/// `Ok(None)` on a clean close between frames.
fn read_frame(stream: &mut impl Read) -> std::io::Result<Option<Vec<u32>>> {
    let mut count_buf = [0u8; 2];
    match stream.read(&mut count_buf)? {
        0 => return Ok(None),
        1 => stream.read_exact(&mut count_buf[1..])?,
        _ => {}
    }
    let count = u16::from_be_bytes(count_buf);
    if count == 0 || count as usize > awg_core::MAX_WORDS_PER_FRAME {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "frame word count out of range"));
    }

    let mut bytes = vec![0u8; 4 * usize::from(count)];
    stream.read_exact(&mut bytes)?;
    let words = bytes.chunks_exact(4).map(|chunk| u32::from_be_bytes(chunk.try_into().unwrap())).collect();
    Ok(Some(words))
}
