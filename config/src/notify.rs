/// Fire-and-forget channel for surfacing integrity problems to the user.
/// The host decides how messages are shown; nothing is consumed back.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }
}
