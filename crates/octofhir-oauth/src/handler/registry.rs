//! Ordered handler collections.

use std::sync::Arc;

use super::{
    AuthorizeEndpointHandler, Handler, HandlerKind, RevocationHandler, TokenEndpointHandler,
    TokenIntrospector,
};

/// Ordered list of handlers with at most one entry per [`HandlerKind`].
pub struct HandlerRegistry<H: ?Sized + Handler> {
    handlers: Vec<Arc<H>>,
}

/// Authorization endpoint handlers.
pub type AuthorizeEndpointHandlers = HandlerRegistry<dyn AuthorizeEndpointHandler>;
/// Token endpoint handlers.
pub type TokenEndpointHandlers = HandlerRegistry<dyn TokenEndpointHandler>;
/// Introspection handlers.
pub type TokenIntrospectionHandlers = HandlerRegistry<dyn TokenIntrospector>;
/// Revocation handlers.
pub type RevocationHandlers = HandlerRegistry<dyn RevocationHandler>;

impl<H: ?Sized + Handler> HandlerRegistry<H> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Appends a handler unless one of the same kind is already present.
    ///
    /// Returns `true` if the handler was added.
    pub fn append(&mut self, handler: Arc<H>) -> bool {
        let kind = handler.kind();
        if self.contains(kind) {
            tracing::trace!(kind = %kind, "Handler kind already registered, skipping");
            return false;
        }
        self.handlers.push(handler);
        true
    }

    /// Returns `true` if a handler of this kind is registered.
    #[must_use]
    pub fn contains(&self, kind: HandlerKind) -> bool {
        self.handlers.iter().any(|h| h.kind() == kind)
    }

    /// Returns the first handler satisfying `predicate`.
    pub fn first_match(&self, mut predicate: impl FnMut(&H) -> bool) -> Option<&Arc<H>> {
        self.handlers.iter().find(|h| predicate(h))
    }

    /// Handlers in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Arc<H>> {
        self.handlers.iter()
    }

    /// Registered kinds in insertion order.
    #[must_use]
    pub fn kinds(&self) -> Vec<HandlerKind> {
        self.handlers.iter().map(|h| h.kind()).collect()
    }

    /// Number of handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<H: ?Sized + Handler> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ?Sized + Handler> Clone for HandlerRegistry<H> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

impl<H: ?Sized + Handler> std::fmt::Debug for HandlerRegistry<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

impl<'a, H: ?Sized + Handler> IntoIterator for &'a HandlerRegistry<H> {
    type Item = &'a Arc<H>;
    type IntoIter = std::slice::Iter<'a, Arc<H>>;

    fn into_iter(self) -> Self::IntoIter {
        self.handlers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, u8);

    impl Handler for Named {
        fn kind(&self) -> HandlerKind {
            HandlerKind(self.0)
        }
    }

    #[test]
    fn test_same_kind_is_ignored() {
        let mut registry: HandlerRegistry<Named> = HandlerRegistry::new();
        assert!(registry.append(Arc::new(Named("a", 1))));
        assert!(registry.append(Arc::new(Named("b", 1))));
        assert!(!registry.append(Arc::new(Named("a", 2))));

        assert_eq!(registry.len(), 2);
        let first = registry.first_match(|h| h.0 == "a").unwrap();
        assert_eq!(first.1, 1);
    }

    #[test]
    fn test_insertion_order() {
        let mut registry: HandlerRegistry<Named> = HandlerRegistry::new();
        for name in ["c", "a", "b"] {
            registry.append(Arc::new(Named(name, 0)));
        }
        assert_eq!(
            registry.kinds(),
            vec![HandlerKind("c"), HandlerKind("a"), HandlerKind("b")]
        );
        assert_eq!(registry.first_match(|_| true).unwrap().0, "c");
        assert!(registry.first_match(|h| h.0 == "z").is_none());
    }

    #[test]
    fn test_empty() {
        let registry: TokenEndpointHandlers = HandlerRegistry::default();
        assert!(registry.is_empty());
    }
}
