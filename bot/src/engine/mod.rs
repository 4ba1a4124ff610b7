//! Pending roster reconciliation: decode the published roster, apply a
//! change, publish the result. The channel is the only store.

pub mod document;
pub mod error;
pub mod reconciler;
pub mod roster;

pub use document::{Member, ParticipantListDocument, RosterDocument};
pub use error::{DecodeError, RosterError};
pub use reconciler::{
    CheckOutcome, EngineSettings, RosterEngine, SubmissionOutcome, find_latest_roster,
    publish_roster,
};
pub use roster::{Mention, initialize_roster, list_pending_mentions, remove_submitter};
