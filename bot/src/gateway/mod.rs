//! Event side of the bot: the session context, inbound message routing, the
//! polling message feed and the reminder schedule.

pub mod dispatcher;
pub mod feed;
pub mod scheduler;
pub mod session;
pub mod submission;

pub use dispatcher::{Dispatcher, ReminderSweep};
pub use feed::MessageFeed;
pub use scheduler::run_reminders;
pub use session::Session;
pub use submission::SubmissionMatcher;
