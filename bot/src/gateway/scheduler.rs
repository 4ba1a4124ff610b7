use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::dispatcher::Dispatcher;
use crate::platform::Platform;

/// Run the reminder pass now and then every `every` until `cancel` fires.
pub async fn run_reminders<P>(dispatcher: &Dispatcher<P>, every: Duration, cancel: CancellationToken)
where
    P: Platform + ?Sized,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(?every, "reminder schedule started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("reminder schedule shutting down");
                break;
            }
            _ = ticker.tick() => {
                if let Err(e) = dispatcher.check_all_channels().await {
                    error!(error = %e, "reminder pass failed");
                }
            }
        }
    }
}
