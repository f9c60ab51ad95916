use awg_hw::MAX_WORDS_PER_FRAME;
use tracing::trace;

use crate::error::ListError;
use crate::notifier::ListState;

/// Hard cap on `total_frames` a single `prepare` may declare.
pub const MAX_TOTAL_FRAMES: u32 = 2_000_000;

/// Word-count growth granularity used when reserving backing storage.
const GROWTH_WORDS: usize = 4 * 1024;

/// One preloaded frame: a contiguous run of `[1, MAX_WORDS_PER_FRAME]` command
/// words inside the list's flat `words` buffer.
#[derive(Clone, Copy, Debug)]
struct FrameRange {
    start: usize,
    len: usize,
}

/// One of the two ping-pong buffers (`LIST0`/`LIST1`). Frames are packed into
/// a single flat `Vec<u32>` to avoid per-frame heap churn while loading.
pub struct List {
    words: Vec<u32>,
    frames: Vec<FrameRange>,
    total_frames: u32,
    state: ListState,
}

impl Default for List {
    fn default() -> Self {
        Self {
            words: Vec::new(),
            frames: Vec::new(),
            total_frames: 0,
            state: ListState::Idle,
        }
    }
}

impl List {
    pub fn state(&self) -> ListState {
        self.state
    }

    /// Frame count declared by the most recent `prepare`.
    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    /// Frames actually pushed so far.
    pub fn loaded_frames(&self) -> u32 {
        self.frames.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Begin loading `total_frames` frames: discard any previous content and
    /// move to `Loading`. Valid from any state; a preload in progress is
    /// simply abandoned.
    pub fn prepare(&mut self, total_frames: u32) -> Result<(), ListError> {
        if total_frames == 0 || total_frames > MAX_TOTAL_FRAMES {
            return Err(ListError::InvalidArgument("total_frames out of range"));
        }
        self.words.clear();
        self.frames.clear();
        self.total_frames = total_frames;
        self.state = ListState::Loading;
        Ok(())
    }

    /// Append one frame. Must follow a `prepare` (or another `push`) and
    /// precede `finalize`. Auto-finalizes (moves to `Ready`) the instant
    /// `loaded_frames` reaches `total_frames`; the caller should check
    /// [`List::state`] afterwards to know whether to publish `Ready`.
    pub fn push(&mut self, frame_words: &[u32]) -> Result<(), ListError> {
        if self.state != ListState::Loading {
            return Err(ListError::InvalidArgument("push outside of a preload"));
        }
        if frame_words.is_empty() || frame_words.len() > MAX_WORDS_PER_FRAME {
            return Err(ListError::InvalidArgument("frame word count out of range"));
        }
        if self.frames.len() as u32 >= self.total_frames {
            return Err(ListError::Overfull);
        }

        let start = self.words.len();
        self.reserve_words(frame_words.len())?;
        self.words.extend_from_slice(frame_words);
        self.frames.push(FrameRange { start, len: frame_words.len() });
        trace!(loaded_frames = self.frames.len(), total_frames = self.total_frames, "list: pushed frame");

        if self.loaded_frames() == self.total_frames {
            self.state = ListState::Ready;
        }
        awg_utils::safe_assert!(self.loaded_frames() <= self.total_frames); // P1
        Ok(())
    }

    /// Close out a preload, moving `Loading` -> `Ready`. Idempotent once
    /// already `Ready` (including the auto-finalize `push` performs). An
    /// empty list may not be finalized: it would have nothing for the
    /// player to play.
    pub fn finalize(&mut self) -> Result<(), ListError> {
        match self.state {
            ListState::Ready => Ok(()),
            ListState::Loading if !self.frames.is_empty() => {
                self.state = ListState::Ready;
                Ok(())
            }
            ListState::Loading => Err(ListError::InvalidArgument("cannot finalize an empty list")),
            ListState::Idle => Err(ListError::InvalidArgument("finalize without a preload")),
        }
    }

    /// Reset to an empty `Idle` list, releasing backing storage.
    pub fn clear(&mut self) {
        self.words = Vec::new();
        self.frames = Vec::new();
        self.total_frames = 0;
        self.state = ListState::Idle;
    }

    /// Fetch frame `index`'s words into `scratch`, replacing its contents.
    /// Used by the player to copy a frame out while holding the lock, so the
    /// lock can be released before the (possibly slow) hardware write.
    pub fn copy_frame_into(&self, index: usize, scratch: &mut Vec<u32>) {
        let range = self.frames[index];
        scratch.clear();
        scratch.extend_from_slice(&self.words[range.start..range.start + range.len]);
    }

    fn reserve_words(&mut self, additional: usize) -> Result<(), ListError> {
        if self.words.len() + additional <= self.words.capacity() {
            return Ok(());
        }
        let grow_to = (self.words.len() + additional).div_ceil(GROWTH_WORDS) * GROWTH_WORDS;
        let extra = grow_to - self.words.capacity();
        self.words.try_reserve(extra).map_err(|_| ListError::OutOfMemory)
    }
}
