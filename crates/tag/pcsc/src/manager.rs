//! Device manager for PC/SC readers

use std::time::{Duration, Instant};

use pcsc::{Context, Scope};
use tracing::debug;

use crate::config::{ConnectStrategy, PcscConfig};
use crate::error::PcscError;
use crate::event::TagEvent;
use crate::monitor::PcscMonitor;
use crate::reader::PcscReader;
use crate::transport::PcscTagTransport;

/// Manager for PC/SC reader operations
pub struct PcscDeviceManager {
    /// PC/SC context
    context: Context,
    /// Configuration applied to transports and monitors
    config: PcscConfig,
}

impl std::fmt::Debug for PcscDeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscDeviceManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PcscDeviceManager {
    /// Create a new PC/SC device manager
    pub fn new() -> Result<Self, PcscError> {
        Self::with_config(PcscConfig::default())
    }

    /// Create a manager with custom configuration
    pub fn with_config(config: PcscConfig) -> Result<Self, PcscError> {
        let context = Context::establish(Scope::User)?;
        Ok(Self { context, config })
    }

    /// List all available readers
    pub fn list_readers(&self) -> Result<Vec<PcscReader>, PcscError> {
        let readers = self.context.list_readers_owned()?;
        if readers.is_empty() {
            return Err(PcscError::NoReadersAvailable);
        }

        let mut result = Vec::with_capacity(readers.len());
        for reader_name in readers {
            let mut reader_states = vec![pcsc::ReaderState::new(
                reader_name.as_c_str(),
                pcsc::State::UNAWARE,
            )];

            match self
                .context
                .get_status_change(Some(Duration::ZERO), &mut reader_states)
            {
                Ok(()) | Err(pcsc::Error::Timeout) => {
                    result.push(PcscReader::from_reader_state(&reader_states[0]));
                }
                Err(e) => {
                    // If we can't get status, assume no tag
                    debug!(error = ?e, "Cannot query reader state");
                    result.push(PcscReader::new(
                        reader_name.to_string_lossy().into_owned(),
                        false,
                        None,
                    ));
                }
            }
        }

        Ok(result)
    }

    /// Open the tag currently on a specific reader
    pub fn open_reader(&self, reader_name: &str) -> Result<PcscTagTransport, PcscError> {
        PcscTagTransport::new(self.context.clone(), reader_name, self.config.clone())
    }

    /// Open the first Type 2 tag found on any reader
    pub fn open_first_tag(&self) -> Result<PcscTagTransport, PcscError> {
        self.connect_strategy(ConnectStrategy::AnyTag)
    }

    /// Open a tag using the specified strategy
    pub fn connect_strategy(
        &self,
        strategy: ConnectStrategy,
    ) -> Result<PcscTagTransport, PcscError> {
        match strategy {
            ConnectStrategy::Reader(name) => self.open_reader(&name),
            ConnectStrategy::AnyTag => {
                let readers = self.list_readers()?;
                let reader = readers
                    .iter()
                    .find(|r| r.has_type2_tag())
                    .or_else(|| readers.iter().find(|r| r.has_tag()))
                    .ok_or_else(|| PcscError::NoTag("no reader holds a tag".to_string()))?;
                self.open_reader(reader.name())
            }
            ConnectStrategy::FirstAvailable => {
                let readers = self.list_readers()?;
                let first = readers.first().ok_or(PcscError::NoReadersAvailable)?;
                self.open_reader(first.name())
            }
        }
    }

    /// Block until a tag is presented to `reader` (any reader when `None`)
    ///
    /// Returns the opened tag, or `None` on timeout.
    pub fn wait_for_tag(
        &self,
        reader: Option<&str>,
        timeout: Duration,
    ) -> Result<Option<PcscTagTransport>, PcscError> {
        let deadline = Instant::now() + timeout;
        let mut monitor = self.monitor();

        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            for event in monitor.wait_for_events(remaining.min(self.config.poll_interval))? {
                if let TagEvent::Present { reader: name, .. } = event {
                    if reader.is_none_or(|wanted| wanted == name) {
                        return self.open_reader(&name).map(Some);
                    }
                }
            }
        }
        Ok(None)
    }

    /// Create a monitor for tag events
    pub fn monitor(&self) -> PcscMonitor {
        PcscMonitor::new(self.context.clone(), self.config.poll_interval)
    }
}
