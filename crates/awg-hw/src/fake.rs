//! An in-memory [`HwBackend`] that records every write, for use in tests
//! that need to assert on the exact word/WEN sequence the layer produced
//! (property P4 of the spec).

use std::sync::{Arc, Mutex};

use crate::backend::HwBackend;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwEvent {
    Data(u32),
    Wen(bool),
}

/// Shared, clonable handle to the events recorded by a [`FakeHwBackend`].
/// Clone this before handing the backend to [`crate::Hw::from_backend`] so
/// the test can still observe what was written.
#[derive(Clone, Default)]
pub struct RecordedEvents(Arc<Mutex<Vec<HwEvent>>>);

impl RecordedEvents {
    pub fn events(&self) -> Vec<HwEvent> {
        self.0.lock().unwrap().clone()
    }

    /// The sequence of words written to DATA, in order, ignoring WEN events.
    pub fn words(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HwEvent::Data(w) => Some(w),
                HwEvent::Wen(_) => None,
            })
            .collect()
    }
}

#[derive(Default)]
pub struct FakeHwBackend {
    events: RecordedEvents,
    pub closed: bool,
}

impl FakeHwBackend {
    /// Returns the backend plus a cloned handle onto its recorded events.
    pub fn new() -> (Self, RecordedEvents) {
        let backend = Self::default();
        let events = backend.events.clone();
        (backend, events)
    }
}

impl HwBackend for FakeHwBackend {
    fn write_data(&mut self, word: u32) {
        self.events.0.lock().unwrap().push(HwEvent::Data(word));
    }

    fn set_wen(&mut self, active: bool) {
        self.events.0.lock().unwrap().push(HwEvent::Wen(active));
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
