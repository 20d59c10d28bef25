// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Change notifications.
//!
//! Managers keep a [`Notifier`] and emit only the events whose
//! preconditions actually held for a mutation. Events are emitted after the
//! mutation has been fully applied, never in the middle of one.

use std::fmt;

/// Notifications emitted by [`crate::models::track_manager::TrackManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEvent {
    /// Tracks were added, removed, renamed or their summary changed
    TrackListChanged,
    /// The active track changed or its points changed
    ActiveTrackDataChanged,
    /// Measurement lines were added or removed, or changed visibility
    LineListChanged,
    /// Something that is drawn changed
    VisualsNeedUpdate,
}

/// Notifications emitted by [`crate::models::scale::ScaleManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleEvent {
    /// Scale value, std-dev or display unit changed
    ScaleOrUnitChanged,
    /// A defined scale line appeared or disappeared
    ScaleLineChanged,
}

type Listener<E> = Box<dyn FnMut(E)>;

/// Registered listeners for one event type.
pub struct Notifier<E> {
    listeners: Vec<Listener<E>>,
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<E> fmt::Debug for Notifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<E: Copy> Notifier<E> {
    /// Register a listener called for every emitted event.
    pub fn subscribe(&mut self, listener: impl FnMut(E) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Deliver one event to every listener.
    pub fn emit(&mut self, event: E) {
        for listener in self.listeners.iter_mut() {
            listener(event);
        }
    }

    /// Deliver a batch of events collected during a mutation, in order.
    pub fn emit_all(&mut self, events: &[E]) {
        for &event in events {
            self.emit(event);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Notifier;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Subscribe a recorder and return the shared event log.
    pub fn record<E: Copy + 'static>(notifier: &mut Notifier<E>) -> Rc<RefCell<Vec<E>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        notifier.subscribe(move |event| sink.borrow_mut().push(event));
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_reaches_all_listeners() {
        let mut notifier = Notifier::default();
        let first = testing::record(&mut notifier);
        let second = testing::record(&mut notifier);

        notifier.emit_all(&[TrackEvent::TrackListChanged, TrackEvent::VisualsNeedUpdate]);

        let expected = vec![TrackEvent::TrackListChanged, TrackEvent::VisualsNeedUpdate];
        assert_eq!(*first.borrow(), expected);
        assert_eq!(*second.borrow(), expected);
    }
}
