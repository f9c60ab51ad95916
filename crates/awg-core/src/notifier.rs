use std::{fmt, io::Write};

use tracing::{debug, warn};

/// Externally observable state of one [`crate::List`]. `Playing`/`Draining`
/// from the data model are implicit in the player's current selection and
/// never surface here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListState {
    Idle,
    Loading,
    Ready,
}

impl fmt::Display for ListState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ListState::Idle => "IDLE",
            ListState::Loading => "LOADING",
            ListState::Ready => "READY",
        };
        f.write_str(s)
    }
}

/// `{subscriber_fd, last_sent[2]}` from the spec: the notifier's own state,
/// guarded by a single lock (`notifier_lock`) separate from `player_lock`.
pub struct NotifierState {
    subscriber: Option<Box<dyn Write + Send>>,
    last_sent: [Option<ListState>; 2],
    list_status: [ListState; 2],
}

impl Default for NotifierState {
    fn default() -> Self {
        Self {
            subscriber: None,
            last_sent: [None, None],
            list_status: [ListState::Idle, ListState::Idle],
        }
    }
}

impl NotifierState {
    pub fn current(&self, list_id: u8) -> ListState {
        self.list_status[usize::from(list_id)]
    }

    /// A new connection replaces any existing subscriber and always receives
    /// both lists' current state, regardless of dedup history.
    pub fn attach(&mut self, mut writer: Box<dyn Write + Send>) {
        self.subscriber = None; // drop (and close) any previous subscriber first
        for list_id in 0..2u8 {
            let state = self.list_status[usize::from(list_id)];
            if send_line(&mut writer, list_id, state).is_err() {
                warn!(list_id, "notifier: new subscriber failed on initial send");
                return;
            }
            self.last_sent[usize::from(list_id)] = Some(state);
        }
        self.subscriber = Some(writer);
    }

    /// Update `list_id`'s current state and, if it differs from the last
    /// state sent to the live subscriber, push a line (P3: never resend an
    /// unchanged state).
    pub fn publish(&mut self, list_id: u8, state: ListState) {
        let idx = usize::from(list_id);
        self.list_status[idx] = state;

        if self.last_sent[idx] == Some(state) {
            return;
        }

        if let Some(writer) = &mut self.subscriber {
            match send_line(writer, list_id, state) {
                Ok(()) => {
                    debug!(list_id, %state, "notifier: pushed status line");
                    self.last_sent[idx] = Some(state);
                }
                Err(err) => {
                    warn!(list_id, %state, ?err, "notifier: send failed, dropping subscriber");
                    self.subscriber = None;
                }
            }
        } else {
            // No live subscriber: remember the state so a future `attach`
            // still sees it, but there is nothing to dedup against yet.
            self.last_sent[idx] = Some(state);
        }
    }
}

fn send_line(writer: &mut (impl Write + ?Sized), list_id: u8, state: ListState) -> std::io::Result<()> {
    writer.write_all(format!("LIST{list_id}:{state}\n").as_bytes())
}
