use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent {
    /// Go to the login entry point, replacing history.
    Login,
}

/// Side channel the client uses to force the screen layer back to login.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self);
}

#[derive(Clone)]
pub struct NavigationBus {
    tx: mpsc::UnboundedSender<NavigationEvent>,
}

impl NavigationBus {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NavigationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for NavigationBus {
    fn redirect_to_login(&self) {
        if self.tx.send(NavigationEvent::Login).is_err() {
            tracing::debug!("login redirect dropped; no screen is listening");
        }
    }
}

/// For callers with no screen layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn redirect_to_login(&self) {}
}
