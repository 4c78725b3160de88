use std::time::Duration;

use eyre::{Result, bail};
use nfc_access_pcsc::{PcscDeviceManager, PcscTagTransport};
use tracing::info;

use super::display;

/// List all available readers
pub fn list_readers(manager: &PcscDeviceManager) -> Result<()> {
    let readers = manager.list_readers()?;

    if readers.is_empty() {
        println!("{}", display::warning("No readers found!"));
        return Ok(());
    }

    println!("{}", display::section_title("Available readers"));
    for (i, reader) in readers.iter().enumerate() {
        let status = if reader.has_type2_tag() {
            "NFC tag present"
        } else if reader.has_tag() {
            "unsupported card present"
        } else {
            "no tag"
        };
        println!("{}. {} ({})", i + 1, reader.name(), status);
    }

    Ok(())
}

/// Block until a tag is presented, failing after `timeout`
pub fn wait_for_tag(
    manager: &PcscDeviceManager,
    reader: Option<&str>,
    timeout: Duration,
) -> Result<PcscTagTransport> {
    if let Some(name) = reader {
        if !manager.list_readers()?.iter().any(|r| r.name() == name) {
            bail!("Reader '{name}' not found");
        }
    }

    println!("{}", display::info("Waiting for a tag..."));
    match manager.wait_for_tag(reader, timeout)? {
        Some(tag) => {
            info!(reader = tag.reader_name(), "Tag presented");
            Ok(tag)
        }
        None => bail!("No tag presented within {}s", timeout.as_secs()),
    }
}
