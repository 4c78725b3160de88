use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::select;
use eyre::{Result, bail, eyre};
use nfc_access_credential::{Authenticity, KeyManager};
use nfc_access_pcsc::{PcscDeviceManager, PcscTagTransport, TagEvent, event::tag_event_channel};
use nfc_access_session::{
    SessionEvent, SessionWorker, TagReadResult, TagSession, UpgradeRequest, WriteRequest,
};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::utils::{display, reader};

/// Everything a tag command needs
pub struct TagContext<'a> {
    pub manager: &'a PcscDeviceManager,
    pub config: &'a Config,
    pub keys: Arc<KeyManager>,
}

impl TagContext<'_> {
    fn session(&self) -> TagSession {
        TagSession::with_options(Arc::clone(&self.keys), self.config.session_options())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    fn require_signing_key(&self) -> Result<()> {
        if self.keys.load_private().is_none() {
            bail!("No signing key configured, run `nfc-access keys generate` first");
        }
        Ok(())
    }
}

/// Report the outcome of a write or upgrade, failing on a failure event
fn finish(event: Option<SessionEvent>) -> Result<()> {
    let event = event.ok_or_else(|| eyre!("Tag produced no result"))?;
    display::event(&event);
    match event {
        SessionEvent::Failure { reason, .. } => Err(reason.into()),
        _ => Ok(()),
    }
}

/// Issue a new credential to the next presented tag
pub fn write_command(
    ctx: &TagContext<'_>,
    name: &str,
    phone: &str,
    email: &str,
    enable_counter: bool,
) -> Result<()> {
    ctx.require_signing_key()?;

    let mut session = ctx.session();
    let request = WriteRequest::new(name, phone, email).with_counter(enable_counter);
    display::event(&session.submit(request));

    let mut tag = reader::wait_for_tag(ctx.manager, ctx.config.reader.as_deref(), ctx.timeout())?;
    finish(session.on_tag_present(&mut tag))
}

/// Read a credential and write it back with a fresh signature
pub fn upgrade_command(ctx: &TagContext<'_>, force: bool) -> Result<()> {
    ctx.require_signing_key()?;

    let mut session = ctx.session();
    let mut tag = reader::wait_for_tag(ctx.manager, ctx.config.reader.as_deref(), ctx.timeout())?;

    let current = read_once(&mut session, &mut tag)?;
    display::read_result(&current);
    if current.authenticity == Some(Authenticity::Genuine) && !force {
        println!(
            "{}",
            display::info("Credential is already signed by this key, nothing to do")
        );
        return Ok(());
    }
    if current.text.trim().is_empty() {
        bail!("Tag holds no credential to upgrade");
    }

    display::event(&session.submit(UpgradeRequest::new(current.uid, current.text)));
    finish(session.on_tag_present(&mut tag))
}

/// Read the next presented tag
pub fn read_command(ctx: &TagContext<'_>) -> Result<()> {
    let mut session = ctx.session();
    let mut tag = reader::wait_for_tag(ctx.manager, ctx.config.reader.as_deref(), ctx.timeout())?;
    display::read_result(&read_once(&mut session, &mut tag)?);
    Ok(())
}

fn read_once(session: &mut TagSession, tag: &mut PcscTagTransport) -> Result<TagReadResult> {
    match session.on_tag_present(tag) {
        Some(SessionEvent::Read(result)) => Ok(result),
        _ => bail!("Failed to read tag, keep it still on the reader and retry"),
    }
}

/// Read every tag presented until the readers go away
pub fn watch_command(ctx: &TagContext<'_>) -> Result<()> {
    let worker = SessionWorker::spawn(ctx.session())?;
    let session_events = worker.subscribe()?;

    let (sender, tag_events) = tag_event_channel();
    let mut monitor = ctx.manager.monitor();
    monitor.start(sender)?;
    println!("{}", display::info("Watching for tags, press Ctrl-C to stop"));

    let wanted = ctx.config.reader.as_deref();
    loop {
        let open = select! {
            recv(tag_events) -> event => match event {
                Ok(TagEvent::Present { reader, .. }) => {
                    if wanted.is_some_and(|name| name != reader) {
                        debug!(%reader, "Ignoring tag on other reader");
                    } else {
                        match ctx.manager.open_reader(&reader) {
                            Ok(tag) => worker.tag_present(Box::new(tag))?,
                            Err(e) => warn!(%reader, error = %e, "Cannot open presented tag"),
                        }
                    }
                    true
                }
                Ok(TagEvent::Removed { reader }) => {
                    debug!(%reader, "Tag removed");
                    true
                }
                Err(_) => false,
            },
            recv(session_events) -> event => match event {
                Ok(event) => {
                    display::event(&event);
                    true
                }
                Err(_) => false,
            },
        };
        if !open {
            break;
        }
    }

    info!("Stopped watching");
    monitor.stop();
    worker.shutdown()?;
    Ok(())
}
