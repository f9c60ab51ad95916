use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use awg_hw::{Hw, zero_gain_frame};
use awg_utils::{ThreadPriority, thread_boot};
use tracing::{debug, info, warn};

use crate::error::ListError;
use crate::notifier::{ListState, NotifierState};
use crate::player::{PlayerCore, TickOutcome};

/// Frame count for the synchronous zero-gain drain §4.4 specifies for
/// `Reset`: "N ≈ 100 frames at the default period." Also the default used
/// by the lifecycle orchestrator's startup/shutdown priming, since it's the
/// same drain.
pub const RESET_DRAIN_FRAMES: u32 = 100;

/// Everything the two network-facing servers and the realtime player thread
/// share: the ping-pong lists and playback cursor (`player_lock`), the
/// notifier's subscriber and dedup state (`notifier_lock`), and the single
/// write path to hardware (its own lock, so the direct server and the
/// player never interleave words on the wire).
pub struct Engine {
    player: Mutex<PlayerCore>,
    notifier: Mutex<NotifierState>,
    hw: Mutex<Hw>,
}

impl Engine {
    pub fn new(hw: Hw, period: Duration) -> Self {
        Self {
            player: Mutex::new(PlayerCore::with_period(period)),
            notifier: Mutex::new(NotifierState::default()),
            hw: Mutex::new(hw),
        }
    }

    pub fn period(&self) -> Duration {
        self.player.lock().unwrap().period()
    }

    pub fn list_state(&self, list_id: u8) -> ListState {
        self.player.lock().unwrap().list(list_id).state()
    }

    /// Begin a preload on `list_id`, discarding anything previously loaded.
    pub fn preload_begin(&self, list_id: u8, total_frames: u32) -> Result<(), ListError> {
        self.player.lock().unwrap().list_mut(list_id).prepare(total_frames)?;
        self.publish(list_id, ListState::Loading);
        Ok(())
    }

    /// Append one frame. If this push reaches the declared `total_frames`
    /// the list auto-finalizes; this method then publishes `Ready` and, if
    /// the player is sitting idle, auto-starts `list_id`.
    pub fn preload_push(&self, list_id: u8, frame_words: &[u32]) -> Result<(), ListError> {
        let mut player = self.player.lock().unwrap();
        player.list_mut(list_id).push(frame_words)?;
        let became_ready = player.list(list_id).state() == ListState::Ready;
        if became_ready {
            self.autostart_if_idle(&mut player, list_id);
        }
        drop(player);
        if became_ready {
            self.publish(list_id, ListState::Ready);
        }
        Ok(())
    }

    /// Close out a preload and, if nothing is currently playing, start it
    /// immediately. Idempotent if `push` already auto-finalized the list.
    pub fn preload_end(&self, list_id: u8) -> Result<(), ListError> {
        let mut player = self.player.lock().unwrap();
        let was_ready_already = player.list(list_id).state() == ListState::Ready;
        player.list_mut(list_id).finalize()?;
        self.autostart_if_idle(&mut player, list_id);
        drop(player);
        if !was_ready_already {
            self.publish(list_id, ListState::Ready);
        }
        Ok(())
    }

    /// Auto-start: the first list to reach `Ready` while nothing is playing
    /// becomes `cur_list`, picked up on the very next tick.
    fn autostart_if_idle(&self, player: &mut PlayerCore, list_id: u8) {
        if !player.is_playing() || player.current_list().is_none() {
            player.queue(list_id);
            player.start();
        }
    }

    /// Abandon a preload in progress, returning `list_id` to `Idle`.
    pub fn cancel_preload(&self, list_id: u8) {
        self.player.lock().unwrap().list_mut(list_id).clear();
        self.publish(list_id, ListState::Idle);
    }

    /// §4.4 `Reset`: stop whatever is playing, then synchronously drain
    /// `RESET_DRAIN_FRAMES` zero-gain frames through list 0, then list 1,
    /// through the ordinary preload/player pipeline — the same mechanism
    /// the lifecycle orchestrator's startup/shutdown priming uses. A
    /// queued connection blocks on `Z` until this returns, exactly as the
    /// wire protocol intends, so there's no concurrency hazard in routing
    /// it through the real pipeline rather than bypassing it: the drain
    /// itself is what serializes against the player thread.
    pub fn reset(&self) {
        {
            let mut player = self.player.lock().unwrap();
            player.halt_and_rewind();
            player.list_mut(0).clear();
            player.list_mut(1).clear();
        }

        info!("engine: reset, draining both lists to silence");
        self.drain_silence(0, RESET_DRAIN_FRAMES);
        self.drain_silence(1, RESET_DRAIN_FRAMES);
        info!("engine: reset complete, output silent");
    }

    /// Load `list_id` with `n_frames` zero-gain frames and block until the
    /// player has consumed all of them and the list has been cleared back
    /// to `Idle`. Used by `reset` and by the lifecycle orchestrator's
    /// startup/shutdown priming — both want the same synchronous "drive
    /// this list to silence" behaviour, just at different moments.
    pub fn drain_silence(&self, list_id: u8, n_frames: u32) {
        if self.preload_begin(list_id, n_frames).is_err() {
            warn!(list_id, "engine: failed to begin silence drain");
            return;
        }
        let frame = zero_gain_frame();
        for _ in 0..n_frames {
            if self.preload_push(list_id, &frame).is_err() {
                warn!(list_id, "engine: failed to push silence frame");
                self.cancel_preload(list_id);
                return;
            }
        }

        let period = self.period();
        let deadline = Instant::now() + period * (n_frames + 1) * 4;
        while self.list_state(list_id) != ListState::Idle {
            if Instant::now() > deadline {
                warn!(list_id, "engine: timed out waiting for silence drain to finish");
                return;
            }
            std::thread::sleep(period);
        }
    }

    /// Send raw command words straight to hardware, bypassing the lists and
    /// player entirely. Used by the direct server.
    pub fn send_direct(&self, words: &[u32]) {
        self.hw.lock().unwrap().send_words(words);
    }

    /// Final shutdown step: silence the output once more and release the
    /// register mapping. Call only after the player thread has stopped.
    pub fn shutdown_hw(&self) {
        let mut hw = self.hw.lock().unwrap();
        hw.zero_output();
        hw.close();
    }

    /// Attach a new notifier subscriber, replacing any previous one. Always
    /// pushes both lists' current state regardless of dedup history.
    pub fn attach_subscriber(&self, writer: Box<dyn std::io::Write + Send>) {
        self.notifier.lock().unwrap().attach(writer);
    }

    fn publish(&self, list_id: u8, state: ListState) {
        self.notifier.lock().unwrap().publish(list_id, state);
    }

    /// Spawn the realtime playback thread. Returns a handle that stops the
    /// thread and joins it on drop or explicit `stop`.
    pub fn spawn_player(self: &Arc<Self>, core: Option<usize>) -> PlayerHandle {
        let engine = Arc::clone(self);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let join = std::thread::Builder::new()
            .name("awg-player".into())
            .spawn(move || engine.run_player(core, &thread_stop))
            .expect("failed to spawn player thread");

        PlayerHandle { stop, join: Some(join) }
    }

    fn run_player(&self, core: Option<usize>, stop: &AtomicBool) {
        thread_boot(core, ThreadPriority::High);
        let period = self.period();
        let mut scratch = Vec::new();
        let mut deadline = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            deadline += period;
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            } else {
                warn!(?period, "player: tick deadline missed");
            }

            let outcome = self.player.lock().unwrap().tick(&mut scratch);
            self.apply_tick(outcome);
        }
    }

    fn apply_tick(&self, outcome: TickOutcome) {
        if let Some((list_id, words)) = outcome.frame {
            debug!(list_id, n_words = words.len(), "player: sending frame");
            self.hw.lock().unwrap().send_words(&words);
        }
        if let Some(list_id) = outcome.finished {
            self.publish(list_id, ListState::Idle);
        }
    }
}

/// Owns the realtime player thread's lifetime. Dropping it (or calling
/// [`PlayerHandle::stop`]) signals the thread to exit and joins it, so the
/// PL gets flushed to a known silent state before the process proceeds.
pub struct PlayerHandle {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl PlayerHandle {
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("player thread panicked");
            }
        }
    }
}

impl Drop for PlayerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test {
    use awg_hw::fake::FakeHwBackend;

    use super::*;

    /// An engine with no player thread running, for tests that assert on
    /// state immediately after a call and would otherwise race a
    /// concurrently-ticking background thread.
    fn test_engine() -> Arc<Engine> {
        let (backend, _events) = FakeHwBackend::new();
        Arc::new(Engine::new(Hw::from_backend(Box::new(backend)), Duration::from_millis(1)))
    }

    /// An engine with a real player thread running, for tests (like the
    /// synchronous drain in `reset`) that need frames to actually be
    /// consumed rather than just sitting queued.
    fn test_engine_with_player() -> (Arc<Engine>, PlayerHandle) {
        let (backend, _events) = FakeHwBackend::new();
        let engine = Arc::new(Engine::new(Hw::from_backend(Box::new(backend)), Duration::from_micros(100)));
        let player = engine.spawn_player(None);
        (engine, player)
    }

    #[test]
    fn preload_end_autostarts_when_idle() {
        let engine = test_engine();
        engine.preload_begin(0, 2).unwrap();
        engine.preload_push(0, &[1, 2, 3]).unwrap();
        engine.preload_end(0).unwrap();

        let player = engine.player.lock().unwrap();
        assert!(player.is_playing());
    }

    #[test]
    fn push_reaching_total_frames_autostarts_without_preload_end() {
        let engine = test_engine();
        engine.preload_begin(0, 1).unwrap();
        engine.preload_push(0, &[1, 2, 3]).unwrap(); // auto-finalizes and autostarts

        let player = engine.player.lock().unwrap();
        assert!(player.is_playing());
        assert_eq!(player.list(0).state(), ListState::Ready);
    }

    #[test]
    fn ping_pong_switches_to_second_list_while_first_is_already_playing() {
        let engine = test_engine();
        engine.preload_begin(0, 1).unwrap();
        engine.preload_push(0, &[1]).unwrap(); // auto-finalizes and autostarts list 0

        // list 1 is preloaded to Ready only after list 0 is already the
        // live, playing list — scenario 2 of the player's acceptance
        // cases. Nothing ever calls `queue(1)` here; the switch must be
        // picked up structurally when list 0 exhausts.
        engine.preload_begin(1, 1).unwrap();
        engine.preload_push(1, &[9]).unwrap();

        let mut scratch = Vec::new();
        let outcome = {
            let mut player = engine.player.lock().unwrap();
            player.tick(&mut scratch); // consumes list 0's only frame
            player.tick(&mut scratch) // list 0 exhausts, list 1 starts in this same tick
        };

        assert_eq!(outcome.finished, Some(0));
        assert_eq!(outcome.frame, Some((1, vec![9])));
    }

    #[test]
    fn reset_clears_both_lists_and_silences_output() {
        let (engine, _player) = test_engine_with_player();
        engine.preload_begin(0, 1).unwrap();
        engine.preload_push(0, &[1]).unwrap();
        engine.preload_end(0).unwrap();

        engine.reset();

        let player = engine.player.lock().unwrap();
        assert!(!player.is_playing());
        assert_eq!(player.list(0).state(), ListState::Idle);
        assert_eq!(player.list(1).state(), ListState::Idle);
    }
}
