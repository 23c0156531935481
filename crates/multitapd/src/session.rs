use multitap_core::config::Config;
use multitap_core::highlight::Highlight;
use multitap_core::ipc::{self, DaemonMsg};
use multitap_core::typing::TypingMachine;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// The daemon's single typing session plus everything watching it.
pub struct Session {
    machine: TypingMachine,
    highlight: Highlight,
    caret: String,
    devices: usize,
    /// Channels to send messages to connected watch clients.
    watcher_txs: Vec<mpsc::UnboundedSender<String>>,
}

impl Session {
    pub fn new(config: &Config, machine: TypingMachine, devices: usize) -> Self {
        Self {
            machine,
            highlight: Highlight::default(),
            caret: config.display.caret.clone(),
            devices,
            watcher_txs: Vec::new(),
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.machine.next_deadline()
    }

    pub fn state_msg(&self) -> DaemonMsg {
        let state = self.machine.state();
        DaemonMsg::State {
            state: state.clone(),
            rendered: state.render(&self.caret),
        }
    }

    pub fn status_msg(&self) -> DaemonMsg {
        DaemonMsg::Status {
            version: env!("CARGO_PKG_VERSION").to_string(),
            debounce_ms: self.machine.debounce().as_millis() as u64,
            devices: self.devices,
            watchers: self.watcher_txs.len(),
        }
    }

    pub fn add_watcher(&mut self, tx: mpsc::UnboundedSender<String>) {
        self.watcher_txs.push(tx);
        info!(watchers = self.watcher_txs.len(), "watcher registered");
    }

    pub fn prune_watchers(&mut self) {
        self.watcher_txs.retain(|tx| !tx.is_closed());
    }

    /// Feed a raw key-down label to the highlight and the typing machine.
    pub fn key_down(&mut self, label: &str, now: Instant) {
        if self.highlight.key_down(label) {
            self.broadcast(&DaemonMsg::Highlight { key: self.highlight.pressed() });
        }
        match self.machine.handle_label(label, now) {
            Some(action) => {
                debug!(label, ?action, "key applied");
                self.broadcast(&self.state_msg());
            }
            None => debug!(label, "ignoring key"),
        }
    }

    /// Key-up only moves the highlight.
    pub fn key_up(&mut self, label: &str) {
        if self.highlight.key_up(label) {
            self.broadcast(&DaemonMsg::Highlight { key: self.highlight.pressed() });
        }
    }

    /// Run the debounce timer if it is due.
    pub fn check_timer(&mut self, now: Instant) {
        if self.machine.check_timer(now) {
            info!(message = %self.machine.state().message, "character committed");
            self.broadcast(&self.state_msg());
        }
    }

    fn broadcast(&mut self, msg: &DaemonMsg) {
        let line = ipc::encode(msg);
        self.watcher_txs.retain(|tx| tx.send(line.clone()).is_ok());
    }
}
