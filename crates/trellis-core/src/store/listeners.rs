use std::rc::Rc;

use crate::store::Change;

pub(crate) type ListenerFn = Rc<dyn Fn(&Change)>;

/// Handle returned when subscribing; pass it to `off` to detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    event: String,
    once: bool,
    callback: ListenerFn,
}

/// Registration-ordered listener list.
#[derive(Default)]
pub(crate) struct Listeners {
    entries: Vec<Listener>,
    next_id: u64,
}

impl Listeners {
    pub(crate) fn add(&mut self, event: String, once: bool, callback: ListenerFn) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push(Listener {
            id,
            event,
            once,
            callback,
        });
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|l| l.id != id);
        self.entries.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.entries.iter().filter(|l| l.event == event).count()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Callbacks subscribed to `event`, in registration order. One-shot
    /// listeners are removed as they are taken.
    pub(crate) fn take_matching(&mut self, event: &str) -> Vec<ListenerFn> {
        let callbacks = self
            .entries
            .iter()
            .filter(|l| l.event == event)
            .map(|l| Rc::clone(&l.callback))
            .collect();
        self.entries.retain(|l| !(l.once && l.event == event));
        callbacks
    }
}
