//! Push-based multicast channels used for every cross-service signal.
//!
//! Two flavours exist. [`Subject`] delivers each value to the listeners that
//! are attached when it is published and forgets it afterwards. It carries
//! transient events such as "object loaded". [`ReplaySubject`] additionally
//! remembers the latest value and hands it to every new listener, which is
//! how persistent state (configuration, camera, lights, materials) is
//! observed.
//!
//! Delivery is synchronous and ordered. A value published from inside a
//! listener is queued and only dispatched once the current value has reached
//! every listener, so all listeners observe the same sequence.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listener<T> {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Callback<T>,
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            active: Arc::clone(&self.active),
            callback: Arc::clone(&self.callback),
        }
    }
}

struct State<T> {
    listeners: Vec<Listener<T>>,
    latest: Option<T>,
    pending: VecDeque<T>,
    dispatching: bool,
    next_id: u64,
}

struct Shared<T> {
    replay: bool,
    state: Mutex<State<T>>,
}

impl<T> Shared<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(replay: bool, initial: Option<T>) -> Arc<Self> {
        Arc::new(Self {
            replay,
            state: Mutex::new(State {
                listeners: Vec::new(),
                latest: initial,
                pending: VecDeque::new(),
                dispatching: false,
                next_id: 0,
            }),
        })
    }

    fn publish(&self, value: T) {
        {
            let mut state = self.state.lock();
            state.pending.push_back(value);
            if state.dispatching {
                return;
            }
            state.dispatching = true;
        }

        loop {
            let (value, listeners) = {
                let mut state = self.state.lock();
                let Some(value) = state.pending.pop_front() else {
                    state.dispatching = false;
                    return;
                };
                if self.replay {
                    state.latest = Some(value.clone());
                }
                (value, state.listeners.clone())
            };
            for listener in listeners {
                if listener.active.load(Ordering::Acquire) {
                    (listener.callback)(&value);
                }
            }
        }
    }

    fn subscribe(self: &Arc<Self>, callback: Callback<T>) -> Subscription {
        let active = Arc::new(AtomicBool::new(true));
        let (id, replayed) = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.listeners.push(Listener {
                id,
                active: Arc::clone(&active),
                callback: Arc::clone(&callback),
            });
            let replayed = if self.replay {
                state.latest.clone()
            } else {
                None
            };
            (id, replayed)
        };

        if let Some(value) = replayed {
            callback(&value);
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        Subscription {
            active,
            detach: Some(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.state.lock().listeners.retain(|l| l.id != id);
                }
            })),
        }
    }

    fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }
}

/// Handle to an attached listener.
///
/// Dropping the handle (or calling [`Subscription::unsubscribe`]) detaches
/// the listener; it receives nothing afterwards, even if a dispatch is in
/// progress.
pub struct Subscription {
    active: Arc<AtomicBool>,
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Fire-once multicast channel.
pub struct Subject<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Subject<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Subject<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            shared: Shared::new(false, None),
        }
    }

    pub fn publish(&self, value: T) {
        self.shared.publish(value);
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.shared.subscribe(Arc::new(callback))
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listener_count()
    }
}

/// Multicast channel that replays its latest value to new listeners.
pub struct ReplaySubject<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ReplaySubject<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for ReplaySubject<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReplaySubject<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a channel without a value; new listeners get nothing until
    /// the first publish.
    pub fn new() -> Self {
        Self {
            shared: Shared::new(true, None),
        }
    }

    /// Creates a channel seeded with an initial value.
    pub fn with_value(value: T) -> Self {
        Self {
            shared: Shared::new(true, Some(value)),
        }
    }

    pub fn publish(&self, value: T) {
        self.shared.publish(value);
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.shared.subscribe(Arc::new(callback))
    }

    /// Returns the most recently dispatched value.
    pub fn latest(&self) -> Option<T> {
        self.shared.state.lock().latest.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listener_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + Send + Sync + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T)) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: &T| sink.lock().push(value.clone()))
    }

    #[test]
    fn subject_does_not_replay() {
        let subject = Subject::new();
        subject.publish(1);
        let (seen, callback) = recorder::<i32>();
        let _sub = subject.subscribe(callback);
        subject.publish(2);
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn replay_subject_delivers_latest_to_new_listener() {
        let subject = ReplaySubject::new();
        subject.publish("a".to_string());
        subject.publish("b".to_string());
        let (seen, callback) = recorder::<String>();
        let _sub = subject.subscribe(callback);
        subject.publish("c".to_string());
        assert_eq!(*seen.lock(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn dropping_subscription_stops_delivery() {
        let subject = ReplaySubject::with_value(0);
        let (seen, callback) = recorder::<i32>();
        let sub = subject.subscribe(callback);
        subject.publish(1);
        drop(sub);
        subject.publish(2);
        assert_eq!(*seen.lock(), vec![0, 1]);
        assert_eq!(subject.listener_count(), 0);
    }

    #[test]
    fn reentrant_publish_keeps_order_for_every_listener() {
        let subject: Subject<i32> = Subject::new();
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));

        let echo = subject.clone();
        let sink = Arc::clone(&first);
        let _a = subject.subscribe(move |value| {
            sink.lock().push(*value);
            if *value == 1 {
                echo.publish(2);
            }
        });
        let sink = Arc::clone(&second);
        let _b = subject.subscribe(move |value| sink.lock().push(*value));

        subject.publish(1);
        assert_eq!(*first.lock(), vec![1, 2]);
        assert_eq!(*second.lock(), vec![1, 2]);
    }

    #[test]
    fn unsubscribe_mid_dispatch_suppresses_pending_delivery() {
        let subject: Subject<i32> = Subject::new();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let (seen, callback) = recorder::<i32>();

        let slot = Arc::clone(&victim);
        let _killer = subject.subscribe(move |_| {
            if let Some(mut sub) = slot.lock().take() {
                sub.unsubscribe();
            }
        });
        *victim.lock() = Some(subject.subscribe(callback));

        subject.publish(1);
        assert!(seen.lock().is_empty());
    }
}
