use std::sync::Arc;

use tracing::{debug, info, warn};

use super::document::{DocumentKind, ROSTER_FILENAME, RosterDocument};
use super::error::RosterError;
use super::roster::{
    DEFAULT_REMINDER_HEADER, initialize_roster, list_pending_mentions, reminder_text,
    remove_submitter,
};
use crate::platform::{
    Attachment, ChannelHistory, ChannelId, DocumentStore, Message, MessageHandle,
    NotificationSink, UserId,
};

/// How many recent messages are searched for the published roster.
pub const DEFAULT_SCAN_LIMIT: usize = 100;

/// Engine knobs taken from the `[roster]` config section.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub scan_limit: usize,
    pub reminder_header: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scan_limit: DEFAULT_SCAN_LIMIT,
            reminder_header: DEFAULT_REMINDER_HEADER.into(),
        }
    }
}

/// Result of a periodic roster check in one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// No roster within the scan bound.
    NoRoster,
    /// Roster found with nobody pending. Nothing was sent.
    NothingPending,
    /// A reminder mentioning `pending` members was sent.
    Reminded { pending: usize },
}

/// Result of handling one qualifying submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    NoRoster,
    /// The author was not on the roster; nothing was republished.
    NotPending,
    Recorded {
        remaining: usize,
        roster: MessageHandle,
    },
}

/// Find the newest message within `scan_limit` that carries the roster
/// attachment. Older copies are ignored.
pub async fn locate_roster<H>(
    history: &H,
    channel: ChannelId,
    scan_limit: usize,
) -> Result<Option<(MessageHandle, Attachment)>, RosterError>
where
    H: ChannelHistory + ?Sized,
{
    let messages = history
        .recent_messages(channel, scan_limit)
        .await
        .map_err(RosterError::Transport)?;

    Ok(messages.iter().take(scan_limit).find_map(|m| {
        m.attachment_named(ROSTER_FILENAME)
            .map(|a| (m.handle(), a.clone()))
    }))
}

/// Locate and decode the current roster. `Ok(None)` means no roster has been
/// published within the scan bound, which is normal for a fresh channel.
pub async fn find_latest_roster<S>(
    source: &S,
    channel: ChannelId,
    scan_limit: usize,
) -> Result<Option<(MessageHandle, RosterDocument)>, RosterError>
where
    S: ChannelHistory + DocumentStore + ?Sized,
{
    let Some((handle, attachment)) = locate_roster(source, channel, scan_limit).await? else {
        debug!(%channel, scan_limit, "no roster in recent history");
        return Ok(None);
    };

    let bytes = source
        .read_attachment(&attachment)
        .await
        .map_err(RosterError::Transport)?;
    let roster = RosterDocument::decode(&bytes)?;
    Ok(Some((handle, roster)))
}

/// Post `roster` as the new canonical copy and pin it. `prior` is deleted only
/// after the new copy is sent and pinned; any failure before that leaves it in
/// place. A failed delete of `prior` is logged, not returned, since the new
/// copy already wins the newest-first lookup.
pub async fn publish_roster<S>(
    store: &S,
    channel: ChannelId,
    roster: &RosterDocument,
    prior: Option<MessageHandle>,
) -> Result<MessageHandle, RosterError>
where
    S: DocumentStore + ?Sized,
{
    let bytes = roster.encode().map_err(RosterError::Encode)?;

    let published = store
        .send_document(channel, DocumentKind::Roster.filename(), bytes)
        .await
        .map_err(RosterError::Transport)?;

    store.pin(published).await.map_err(RosterError::Transport)?;

    if let Some(prior) = prior
        && prior != published
        && let Err(e) = store.delete(prior).await
    {
        warn!(%channel, prior = %prior.message_id, error = %e, "failed to delete superseded roster");
    }

    info!(%channel, message = %published.message_id, pending = roster.pending.len(), "roster published");
    Ok(published)
}

/// Runs roster workflows against a platform. Holds no roster state of its
/// own: every call re-reads the published document.
pub struct RosterEngine<P: ?Sized> {
    platform: Arc<P>,
    settings: EngineSettings,
}

impl<P> RosterEngine<P>
where
    P: ChannelHistory + DocumentStore + NotificationSink + ?Sized,
{
    pub fn new(platform: Arc<P>, settings: EngineSettings) -> Self {
        Self { platform, settings }
    }

    /// Remind everyone still pending in `channel`. Sends nothing when the
    /// roster is missing or empty.
    pub async fn check_channel(&self, channel: ChannelId) -> Result<CheckOutcome, RosterError> {
        let Some((_, roster)) =
            find_latest_roster(self.platform.as_ref(), channel, self.settings.scan_limit).await?
        else {
            return Ok(CheckOutcome::NoRoster);
        };

        let mentions = list_pending_mentions(&roster);
        let Some(text) = reminder_text(&self.settings.reminder_header, &mentions) else {
            debug!(%channel, "roster empty, no reminder");
            return Ok(CheckOutcome::NothingPending);
        };

        self.platform
            .send_text(channel, &text)
            .await
            .map_err(RosterError::Transport)?;

        info!(%channel, pending = mentions.len(), "reminder sent");
        Ok(CheckOutcome::Reminded {
            pending: mentions.len(),
        })
    }

    /// Start a new roster from every participant-list attachment on `message`.
    /// Each one replaces whatever roster was current.
    pub async fn initialize_from_message(
        &self,
        message: &Message,
    ) -> Result<Vec<MessageHandle>, RosterError> {
        let channel = message.channel_id;
        let mut published = Vec::new();

        for attachment in message
            .attachments
            .iter()
            .filter(|a| {
                DocumentKind::from_filename(&a.filename) == Some(DocumentKind::ParticipantList)
            })
        {
            let bytes = self
                .platform
                .read_attachment(attachment)
                .await
                .map_err(RosterError::Transport)?;
            let roster = initialize_roster(&bytes)?;

            let prior = locate_roster(self.platform.as_ref(), channel, self.settings.scan_limit)
                .await?
                .map(|(handle, _)| handle);

            let handle = publish_roster(self.platform.as_ref(), channel, &roster, prior).await?;
            info!(%channel, participants = roster.pending.len(), "roster initialized");
            published.push(handle);
        }

        Ok(published)
    }

    /// Drop `submitter` from the current roster and republish it.
    pub async fn record_submission(
        &self,
        channel: ChannelId,
        submitter: UserId,
    ) -> Result<SubmissionOutcome, RosterError> {
        let Some((prior, roster)) =
            find_latest_roster(self.platform.as_ref(), channel, self.settings.scan_limit).await?
        else {
            return Ok(SubmissionOutcome::NoRoster);
        };

        if !roster.contains(submitter) {
            debug!(%channel, %submitter, "submitter not pending");
            return Ok(SubmissionOutcome::NotPending);
        }
        let updated = remove_submitter(&roster, submitter);

        let handle = publish_roster(self.platform.as_ref(), channel, &updated, Some(prior)).await?;
        info!(%channel, %submitter, remaining = updated.pending.len(), "submission recorded");
        Ok(SubmissionOutcome::Recorded {
            remaining: updated.pending.len(),
            roster: handle,
        })
    }
}
