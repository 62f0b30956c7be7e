use async_trait::async_trait;
use tokio::sync::watch;

/// Network-status source consumed by the sync engine and, indirectly, by
/// anything serving cached data while offline.
///
/// Implementations wrap whatever the platform exposes (NetInfo on the mobile
/// shells, a stub in tests). Dropping the returned receiver unsubscribes from
/// change notifications.
#[async_trait]
pub trait ConnectivityObserver: Send + Sync {
    /// Whether the device currently reports a usable connection.
    async fn is_connected(&self) -> bool;

    /// Change-notification stream. The receiver yields the new state on every
    /// online/offline transition.
    fn watch(&self) -> watch::Receiver<bool>;
}

/// Connectivity observer fed by platform glue.
///
/// The host app calls [`set_online`](ConnectivityHandle::set_online) from its
/// network monitor callback; repeated reports of the same state are dropped so
/// watchers only wake on real transitions.
pub struct ConnectivityHandle {
    state: watch::Sender<bool>,
}

impl ConnectivityHandle {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self { state }
    }

    /// Records the latest network state. Notifies watchers only on change.
    pub fn set_online(&self, online: bool) {
        self.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

#[async_trait]
impl ConnectivityObserver for ConnectivityHandle {
    async fn is_connected(&self) -> bool {
        *self.state.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }
}
