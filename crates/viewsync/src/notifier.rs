//! In-process change channel.

use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use log::trace;

use crate::services::{ChangeChannel, ChangeListener, Registration};

type Listeners = Vec<(u64, Arc<dyn Fn() + Send + Sync>)>;

#[derive(Default)]
struct Inner {
    next_id: u64,
    listeners: Listeners,
}

/// A [`ChangeChannel`] that fans every [`ChangeNotifier::notify`] call out to
/// the registered listeners.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    inner: Arc<Mutex<Inner>>,
}

impl ChangeNotifier {
    /// Creates a channel without listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals every registered listener.
    ///
    /// Listeners run on the calling thread, outside the channel's lock, so a
    /// listener may register or unregister other listeners.
    pub fn notify(&self) {
        let listeners: Vec<_> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        trace!(listeners = listeners.len(); "Change notification");
        for listener in listeners {
            listener();
        }
    }

    /// Returns the number of registered listeners.
    pub fn listeners_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }
}

impl ChangeChannel for ChangeNotifier {
    fn on_did_change(&self, listener: ChangeListener) -> Registration {
        let id = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Arc::from(listener)));
            id
        };

        let inner = Arc::clone(&self.inner);
        Registration::new(move || {
            inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .listeners
                .retain(|(listener_id, _)| *listener_id != id);
        })
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listeners_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_listener(counter: &Arc<AtomicUsize>) -> ChangeListener {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_notify_reaches_all_listeners() {
        let notifier = ChangeNotifier::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));

        let _ra = notifier.on_did_change(counting_listener(&a));
        let _rb = notifier.on_did_change(counting_listener(&b));
        notifier.notify();
        notifier.notify();

        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disposed_listener_is_not_called() {
        let notifier = ChangeNotifier::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut registration = notifier.on_did_change(counting_listener(&calls));
        notifier.notify();
        registration.dispose();
        notifier.notify();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.listeners_count(), 0);
    }

    #[test]
    fn test_dispose_unregisters_after_lock_poisoned() {
        let notifier = ChangeNotifier::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registration = notifier.on_did_change(counting_listener(&calls));

        let inner = Arc::clone(&notifier.inner);
        let poisoner = std::thread::spawn(move || {
            let _guard = inner.lock().unwrap();
            panic!("listener panicked while holding the lock");
        });
        assert!(poisoner.join().is_err());

        registration.dispose();
        notifier.notify();

        assert_eq!(notifier.listeners_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
