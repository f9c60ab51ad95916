use std::time::Duration;

use tracing::trace;

use crate::list::List;
use crate::notifier::ListState;

/// Default tick period when no override is configured.
pub const DEFAULT_PERIOD_US: u64 = 1_000;

/// What a [`PlayerCore::tick`] call produced, for the caller (the engine) to
/// act on. `finished` and `frame` may both be set: a list finishing and its
/// successor starting are collapsed into the same tick so there is never an
/// idle period between them.
#[derive(Default)]
pub struct TickOutcome {
    /// A list that just played its last frame and was cleared to `Idle`.
    pub finished: Option<u8>,
    /// A frame to send for `list_id`, plus the words to write.
    pub frame: Option<(u8, Vec<u32>)>,
}

/// The ping-pong player's own state: which of the two lists is live, which
/// is queued to take over, and where inside the live list playback sits.
pub struct PlayerCore {
    lists: [List; 2],
    playing: bool,
    cur_list: Option<u8>,
    next_list: Option<u8>,
    cur_frame: usize,
    period: Duration,
}

impl Default for PlayerCore {
    fn default() -> Self {
        Self {
            lists: [List::default(), List::default()],
            playing: false,
            cur_list: None,
            next_list: None,
            cur_frame: 0,
            period: Duration::from_micros(DEFAULT_PERIOD_US),
        }
    }
}

impl PlayerCore {
    pub fn with_period(period: Duration) -> Self {
        Self { period, ..Self::default() }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn list(&self, list_id: u8) -> &List {
        &self.lists[usize::from(list_id)]
    }

    pub fn list_mut(&mut self, list_id: u8) -> &mut List {
        &mut self.lists[usize::from(list_id)]
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_list(&self) -> Option<u8> {
        self.cur_list
    }

    pub fn start(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Queue `list_id` to become the playing list on the very next tick.
    /// Only meaningful while idle (`cur_list` is `None`): once a list is
    /// already playing, its successor is picked up structurally — the
    /// sibling list, whenever it becomes `Ready` — without needing a call
    /// here. See the exhaustion branch of [`Self::tick`].
    pub fn queue(&mut self, list_id: u8) {
        self.next_list = Some(list_id);
    }

    /// A hard stop and rewind of the live list used by `reset`: clears
    /// playback position without touching preload state of either list.
    pub fn halt_and_rewind(&mut self) {
        self.playing = false;
        self.cur_list = None;
        self.next_list = None;
        self.cur_frame = 0;
    }

    /// Advance playback by one period. Internally loops so a list that
    /// finishes and a successor that is ready to start are both resolved
    /// within this single call: no period goes by with nothing queued for
    /// hardware even though a list transition happened.
    pub fn tick(&mut self, scratch: &mut Vec<u32>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if !self.playing {
            return outcome;
        }

        loop {
            let Some(list_id) = self.cur_list else {
                match self.next_list.take() {
                    Some(id) if self.lists[usize::from(id)].state() == ListState::Ready => {
                        self.cur_list = Some(id);
                        self.cur_frame = 0;
                        continue;
                    }
                    Some(id) => {
                        // Queued but not ready yet: drop the request, the
                        // direct/finalize path is responsible for re-queuing.
                        trace!(list_id = id, "player: queued list not ready, dropping");
                        self.playing = false;
                        return outcome;
                    }
                    None => {
                        self.playing = false;
                        return outcome;
                    }
                }
            };

            let list = &self.lists[usize::from(list_id)];
            if self.cur_frame as u32 >= list.loaded_frames() {
                self.list_mut(list_id).clear();
                self.cur_list = None;
                self.cur_frame = 0;
                trace!(list_id, "player: list exhausted, cleared to idle");
                outcome.finished = Some(list_id);

                // P2: next_list is structurally the complement of cur_list
                // while playing, not merely "whatever was last queued" — so
                // re-derive it from the sibling list's own state here rather
                // than trusting an external queue() call. A list that was
                // readied while its sibling was already playing never gets a
                // queue() call from anyone; without this check it would be
                // silently dropped instead of picked up on this same tick.
                let other = 1 - list_id;
                if self.lists[usize::from(other)].state() == ListState::Ready {
                    self.next_list = Some(other);
                }
                continue; // same tick: see if a successor is ready to start
            }

            list.copy_frame_into(self.cur_frame, scratch);
            self.cur_frame += 1;
            awg_utils::safe_assert!(self.cur_frame as u32 <= list.total_frames()); // P2
            outcome.frame = Some((list_id, std::mem::take(scratch)));
            return outcome;
        }
    }
}
