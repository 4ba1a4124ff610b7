use std::fmt;

use super::document::{ParticipantListDocument, RosterDocument};
use super::error::DecodeError;
use crate::platform::UserId;

/// Default reminder header: "The following have not submitted yet:".
pub const DEFAULT_REMINDER_HEADER: &str = "以下はまだ提出していません:";

/// A user mention, rendered as `<@id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mention(pub UserId);

impl fmt::Display for Mention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<@{}>", self.0)
    }
}

/// Build a fresh roster from an uploaded participant list. Every participant
/// starts out pending, in list order, duplicates included.
pub fn initialize_roster(participant_list: &[u8]) -> Result<RosterDocument, DecodeError> {
    let list = ParticipantListDocument::decode(participant_list)?;
    Ok(RosterDocument::new(list.participants))
}

/// One mention per pending member, in roster order.
pub fn list_pending_mentions(roster: &RosterDocument) -> Vec<Mention> {
    roster.pending.iter().map(|m| Mention(m.id)).collect()
}

/// Roster without any entry for `submitter`. Unknown submitters leave it as is.
pub fn remove_submitter(roster: &RosterDocument, submitter: UserId) -> RosterDocument {
    roster.with_pending(
        roster
            .pending
            .iter()
            .filter(|m| m.id != submitter)
            .cloned()
            .collect(),
    )
}

/// Reminder text, or `None` when nobody is pending and nothing should be sent.
pub fn reminder_text(header: &str, mentions: &[Mention]) -> Option<String> {
    if mentions.is_empty() {
        return None;
    }
    let lines: Vec<String> = mentions.iter().map(Mention::to_string).collect();
    Some(format!("{header}\n{}", lines.join("\n")))
}
