use std::path::Path;

use tracing::trace;

use crate::{
    backend::{HwBackend, MmapBackend},
    command::zero_gain_frame,
    error::HwError,
};

/// The single write path to the AWG peripheral. Single-writer: callers are
/// responsible for ensuring only one thread calls [`Hw::send_words`] at a
/// time (the player and the direct server share one `Arc<Mutex<Hw>>`).
pub struct Hw {
    backend: Box<dyn HwBackend>,
}

impl Hw {
    /// Map the real peripheral register windows at `data_base`/`wen_base`.
    pub fn open(
        mem_device: &Path,
        data_base: usize,
        wen_base: usize,
        window_len: usize,
        wen_active_high: bool,
    ) -> Result<Self, HwError> {
        let backend = MmapBackend::open(mem_device, data_base, wen_base, window_len, wen_active_high)?;
        Ok(Self { backend: Box::new(backend) })
    }

    /// Wrap an arbitrary backend (a [`crate::fake::FakeHwBackend`] in tests).
    pub fn from_backend(backend: Box<dyn HwBackend>) -> Self {
        Self { backend }
    }

    /// Emit `words` in order, pulsing WEN once per word. Synchronous: returns
    /// only after the last WEN pulse has been driven.
    pub fn send_words(&mut self, words: &[u32]) {
        for &word in words {
            trace!(word = format_args!("{word:#010x}"), "AWG word");
            self.backend.write_data(word);
            self.backend.set_wen(true);
            self.backend.set_wen(false);
        }
    }

    /// Drive every `(channel, tone)` gain to 0 and commit, silencing output.
    pub fn zero_output(&mut self) {
        self.send_words(&zero_gain_frame());
    }

    /// Unmap and release the backing descriptor.
    pub fn close(&mut self) {
        self.backend.close();
    }
}
