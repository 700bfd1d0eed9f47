//! # Event types and their declared supertypes.
//!
//! Rust has no runtime inheritance, so an event type lists the types it can be
//! viewed as through [`Event::lineage`]. At publish time the broker asks the
//! published type for its [`Lineage`] and dispatches to every registered group
//! whose type appears in it.
//!
//! ```text
//! publish::<Circle>(c)
//!     Lineage<Circle> = [ Circle, dyn Shape, Figure, ... ]
//!                          │         │         │
//!                          ▼         ▼         ▼
//!                   group<Circle> group<dyn Shape> group<Figure>   (if registered)
//! ```
//!
//! ## Rules
//! - The published type itself always comes first.
//! - A type declared twice keeps its first view.
//! - Lineage is one-way: declaring `Circle: dyn Shape` lets `dyn Shape`
//!   subscribers see circles, never the other way round.
//! - Cyclic declarations (`A` inherits `B` inherits `A`) are cut at the
//!   first repeated type.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use taskgate::{Event, Lineage};
//!
//! trait Shape: Send + Sync {
//!     fn area(&self) -> f64;
//! }
//! impl Event for dyn Shape {}
//!
//! struct Circle { r: f64 }
//! impl Shape for Circle {
//!     fn area(&self) -> f64 { 3.14 * self.r * self.r }
//! }
//! impl Event for Circle {
//!     fn lineage(l: &mut Lineage<Self>) {
//!         l.extends(|c: Arc<Circle>| -> Arc<dyn Shape> { c });
//!     }
//! }
//! ```

use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

/// Type-erased event handed to a subscriber group: an `Arc<S>` for the group's `S`.
pub(crate) type Payload = Box<dyn Any + Send + Sync>;

type View<E> = Arc<dyn Fn(&Arc<E>) -> Payload + Send + Sync>;

/// A type that can be published through the [`EventBroker`](crate::EventBroker).
///
/// Implement it for every type you publish. Override [`Event::lineage`] to
/// declare supertypes whose subscribers should also receive this event.
/// Trait objects may implement it too (`impl Event for dyn Shape {}`), which
/// allows publishing an `Arc<dyn Shape>` via
/// [`EventBroker::publish_shared`](crate::EventBroker::publish_shared).
pub trait Event: Send + Sync + 'static {
    /// Declares the supertypes of this event. Default: none.
    fn lineage(lineage: &mut Lineage<Self>) {
        let _ = lineage;
    }
}

/// Ordered set of declared types an event of type `E` can be viewed as.
pub struct Lineage<E: ?Sized> {
    views: Vec<(TypeId, &'static str, View<E>)>,
    /// Types whose lineage is being built further up the `inherits` chain.
    visiting: Vec<TypeId>,
}

impl<E: Event + ?Sized> Lineage<E> {
    /// Builds the full lineage of `E`, starting with `E` itself.
    pub(crate) fn of() -> Self {
        Self::resolve(Vec::new())
    }

    fn resolve(mut visiting: Vec<TypeId>) -> Self {
        visiting.push(TypeId::of::<E>());
        let mut lineage = Self {
            views: Vec::new(),
            visiting,
        };
        lineage.push(
            TypeId::of::<E>(),
            type_name::<E>(),
            Arc::new(|ev: &Arc<E>| Box::new(Arc::clone(ev)) as Payload),
        );
        E::lineage(&mut lineage);
        lineage
    }

    /// Declares `S` as a direct supertype of `E`.
    ///
    /// `upcast` turns the published event into the value `S` subscribers
    /// receive, typically an unsizing coercion (`|c| -> Arc<dyn Shape> { c }`)
    /// or a projection onto an embedded base struct.
    pub fn extends<S, F>(&mut self, upcast: F) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<E>) -> Arc<S> + Send + Sync + 'static,
    {
        self.push(
            TypeId::of::<S>(),
            type_name::<S>(),
            Arc::new(move |ev: &Arc<E>| Box::new(upcast(Arc::clone(ev))) as Payload),
        );
        self
    }

    /// Declares `S` and, transitively, every supertype `S` declares.
    pub fn inherits<S, F>(&mut self, upcast: F) -> &mut Self
    where
        S: Event + ?Sized,
        F: Fn(Arc<E>) -> Arc<S> + Send + Sync + 'static,
    {
        if self.visiting.contains(&TypeId::of::<S>()) {
            tracing::debug!(
                event = type_name::<E>(),
                supertype = type_name::<S>(),
                "cyclic event lineage ignored"
            );
            return self;
        }
        let upcast = Arc::new(upcast);
        for (id, name, view) in Lineage::<S>::resolve(self.visiting.clone()).views {
            let upcast = Arc::clone(&upcast);
            self.push(
                id,
                name,
                Arc::new(move |ev: &Arc<E>| view(&upcast(Arc::clone(ev)))),
            );
        }
        self
    }

    /// Number of declared types, `E` included.
    pub(crate) fn len(&self) -> usize {
        self.views.len()
    }

    #[cfg(test)]
    fn contains<S: ?Sized + 'static>(&self) -> bool {
        self.position(TypeId::of::<S>()).is_some()
    }

    #[cfg(test)]
    fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.views.iter().map(|(_, name, _)| *name)
    }

    /// Declared types with the view producing each one's payload.
    pub(crate) fn views(&self) -> impl Iterator<Item = (TypeId, &View<E>)> + '_ {
        self.views.iter().map(|(id, _, view)| (*id, view))
    }

    fn position(&self, id: TypeId) -> Option<usize> {
        self.views.iter().position(|(known, _, _)| *known == id)
    }

    fn push(&mut self, id: TypeId, name: &'static str, view: View<E>) {
        if self.position(id).is_none() {
            self.views.push((id, name, view));
        }
    }
}

impl<E: ?Sized> std::fmt::Debug for Lineage<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.views.iter().map(|(_, name, _)| name))
            .finish()
    }
}
