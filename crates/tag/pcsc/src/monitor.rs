//! Monitor for tags entering and leaving reader fields

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use pcsc::{Context, ReaderState, State};
use tracing::{debug, info, warn};

use crate::error::PcscError;
use crate::event::{TagEvent, TagEventSender};

/// Last seen state per reader: (state, ATR)
type StateMap = HashMap<String, (State, Vec<u8>)>;

/// Watches every reader and reports tag presence changes
pub struct PcscMonitor {
    /// PC/SC context
    context: Context,
    /// How long one status wait may block
    poll_interval: Duration,
    /// Whether the monitor is running
    running: Arc<AtomicBool>,
    /// Previously seen reader states (to avoid duplicate events)
    previous_states: Arc<Mutex<StateMap>>,
    /// Monitoring thread
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PcscMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscMonitor")
            .field("poll_interval", &self.poll_interval)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl PcscMonitor {
    /// Create a new monitor
    pub(crate) fn new(context: Context, poll_interval: Duration) -> Self {
        Self {
            context,
            poll_interval,
            running: Arc::new(AtomicBool::new(false)),
            previous_states: Arc::new(Mutex::new(HashMap::new())),
            handle: None,
        }
    }

    /// Whether the monitoring thread is active
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Block until the next tag event or until `timeout` elapses
    pub fn wait_for_events(&mut self, timeout: Duration) -> Result<Vec<TagEvent>, PcscError> {
        let mut reader_states = current_reader_states(&self.context)?;
        match self
            .context
            .get_status_change(Some(timeout), &mut reader_states)
        {
            Ok(()) | Err(pcsc::Error::Timeout) => {}
            Err(e) => return Err(e.into()),
        }

        let mut previous = self.previous_states.lock();
        Ok(collect_events(&mut previous, &reader_states))
    }

    /// Start watching on a background thread, sending events to `sender`
    ///
    /// The thread stops on [`stop`](Self::stop), on drop, or when every
    /// receiver has gone away.
    pub fn start(&mut self, sender: TagEventSender) -> Result<(), PcscError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let context = self.context.clone();
        let running = Arc::clone(&self.running);
        let previous_states = Arc::clone(&self.previous_states);
        let poll_interval = self.poll_interval;

        let handle = thread::Builder::new()
            .name("pcsc-monitor".into())
            .spawn(move || {
                info!("Tag monitor started");
                while running.load(Ordering::SeqCst) {
                    let mut reader_states = match current_reader_states(&context) {
                        Ok(states) => states,
                        Err(e) => {
                            debug!(error = ?e, "Cannot list readers");
                            thread::sleep(poll_interval);
                            continue;
                        }
                    };

                    // Timeouts still carry the snapshot taken above
                    match context.get_status_change(Some(poll_interval), &mut reader_states) {
                        Ok(()) | Err(pcsc::Error::Timeout) => {}
                        Err(pcsc::Error::Cancelled) => continue,
                        Err(e) => {
                            warn!(error = ?e, "Status change wait failed");
                            thread::sleep(poll_interval);
                            continue;
                        }
                    }

                    let events = collect_events(&mut previous_states.lock(), &reader_states);
                    for event in events {
                        debug!(?event, "Tag event");
                        if sender.send(event).is_err() {
                            running.store(false, Ordering::SeqCst);
                            break;
                        }
                    }

                    // Small delay to prevent tight loop
                    thread::sleep(Duration::from_millis(10));
                }
                info!("Tag monitor stopped");
            })
            .map_err(|e| PcscError::PassThrough(format!("cannot spawn monitor: {e}")))?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop monitoring and wait for the thread to finish
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Err(e) = self.context.cancel() {
            debug!(error = ?e, "Failed to cancel status wait");
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Tag monitor thread panicked");
            }
        }
    }
}

impl Drop for PcscMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reader states for every connected reader, synced to their last known state
fn current_reader_states(context: &Context) -> Result<Vec<ReaderState>, PcscError> {
    let mut reader_states = vec![ReaderState::new(pcsc::PNP_NOTIFICATION(), State::UNAWARE)];
    for reader in context.list_readers_owned()? {
        reader_states.push(ReaderState::new(reader, State::UNAWARE));
    }
    // First call reports the current state immediately
    match context.get_status_change(Some(Duration::ZERO), &mut reader_states) {
        Ok(()) | Err(pcsc::Error::Timeout) => {}
        Err(e) => return Err(e.into()),
    }
    for rs in &mut reader_states {
        rs.sync_current_state();
    }
    Ok(reader_states)
}

/// Turn fresh reader states into presence events
fn collect_events(previous: &mut StateMap, reader_states: &[ReaderState]) -> Vec<TagEvent> {
    reader_states
        .iter()
        .filter(|rs| rs.name() != pcsc::PNP_NOTIFICATION())
        .filter_map(|rs| {
            track_state(
                previous,
                rs.name().to_string_lossy().into_owned(),
                rs.event_state(),
                rs.atr(),
            )
        })
        .collect()
}

/// Compare a reader's state with the last one seen and report the change
fn track_state(
    previous: &mut StateMap,
    reader: String,
    state: State,
    atr: &[u8],
) -> Option<TagEvent> {
    if state.contains(State::PRESENT) && !state.contains(State::EMPTY) {
        // A new tag, or a different tag on the same reader
        let is_new = previous
            .get(&reader)
            .is_none_or(|(prev, prev_atr)| !prev.contains(State::PRESENT) || prev_atr != atr);
        if !is_new {
            return None;
        }
        previous.insert(reader.clone(), (state, atr.to_vec()));
        Some(TagEvent::Present {
            reader,
            atr: atr.to_vec(),
        })
    } else if state.contains(State::EMPTY) {
        // Don't report removal if we never saw it present
        let was_present = previous
            .get(&reader)
            .is_some_and(|(prev, _)| prev.contains(State::PRESENT));
        previous.insert(reader.clone(), (state, Vec::new()));
        was_present.then_some(TagEvent::Removed { reader })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READER: &str = "ACS ACR122U PICC Interface";

    #[test]
    fn test_presence_then_removal() {
        let mut previous = StateMap::new();
        let present = State::PRESENT | State::CHANGED;

        assert_eq!(
            track_state(&mut previous, READER.into(), present, &[0x3B, 0x8F]),
            Some(TagEvent::Present {
                reader: READER.into(),
                atr: vec![0x3B, 0x8F]
            })
        );
        // Same tag still in the field
        assert_eq!(track_state(&mut previous, READER.into(), present, &[0x3B, 0x8F]), None);

        assert_eq!(
            track_state(&mut previous, READER.into(), State::EMPTY, &[]),
            Some(TagEvent::Removed {
                reader: READER.into()
            })
        );
        assert_eq!(track_state(&mut previous, READER.into(), State::EMPTY, &[]), None);
    }

    #[test]
    fn test_empty_reader_never_reports_removal() {
        let mut previous = StateMap::new();
        assert_eq!(track_state(&mut previous, READER.into(), State::EMPTY, &[]), None);
    }

    #[test]
    fn test_tag_swap_is_new_presence() {
        let mut previous = StateMap::new();
        track_state(&mut previous, READER.into(), State::PRESENT, &[0x01]);
        assert!(matches!(
            track_state(&mut previous, READER.into(), State::PRESENT, &[0x02]),
            Some(TagEvent::Present { .. })
        ));
    }
}
