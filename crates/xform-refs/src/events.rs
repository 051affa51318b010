//! Change notifications.
//!
//! Observers are plain closures, called synchronously in subscription order
//! while the emitting operation runs.

use crate::itext::ItemKey;
use crate::model::Ufid;

/// A subscriber to events of type `E`.
pub type Observer<E> = Box<dyn FnMut(&E)>;

/// Handle returned by [`Emitter::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// An explicit observer list.
pub struct Emitter<E> {
    observers: Vec<(SubscriptionId, Observer<E>)>,
    next_id: u64,
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self {
            observers: Vec::new(),
            next_id: 0,
        }
    }
}

impl<E> std::fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    pub fn fire(&mut self, event: &E) {
        for (_, observer) in &mut self.observers {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

/// Events fired by a [`FormSession`](crate::session::FormSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    /// A property was written, by the caller or by a reference rewrite.
    PropertyChanged {
        node: Ufid,
        property: String,
        previous: Option<String>,
        value: Option<String>,
    },
    /// The default text shown for a node's label changed.
    LabelTextChanged { node: Ufid, text: String },
    /// A node's absolute path changed.
    NodeRenamed {
        node: Ufid,
        old_path: String,
        new_path: String,
    },
    NodeRemoved { node: Ufid },
    /// `copy` was created as a duplicate of `original`.
    NodeDuplicated { original: Ufid, copy: Ufid },
    /// A translation item's text changed outside a property write.
    ItemChanged { key: ItemKey },
    /// Translations were replaced in bulk.
    ItextChanged,
}
