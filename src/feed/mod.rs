use tokio::sync::watch;

pub mod live;
pub mod poller;
pub mod simulator;
pub mod transport;

/// Resolves once the stop flag is raised or its sender is gone.
pub(crate) async fn stopped(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}
