//! Automatic layer naming.
//!
//! Every layer built without an explicit name draws one from a [`NameRegistry`]:
//! the first layer of a kind gets the bare prefix (`dense`), later ones get a
//! numeric suffix (`dense_1`, `dense_2`, ...). Each thread owns a default
//! registry; [`with_registry`] swaps in a caller-owned one while a model is being
//! constructed so independent builds can start from a clean slate.

use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct NameRegistry {
    counters: HashMap<String, usize>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_name(&mut self, prefix: &str) -> String {
        match self.counters.get_mut(prefix) {
            Some(count) => {
                *count += 1;
                format!("{}_{}", prefix, count)
            }
            None => {
                self.counters.insert(prefix.to_string(), 0);
                prefix.to_string()
            }
        }
    }

    pub fn reset(&mut self) {
        self.counters.clear();
    }
}

thread_local! {
    static REGISTRY: RefCell<NameRegistry> = RefCell::new(NameRegistry::new());
}

pub fn next_name(prefix: &str) -> String {
    REGISTRY.with(|r| r.borrow_mut().next_name(prefix))
}

/// Forgets every name handed out by this thread's default registry.
pub fn reset_names() {
    REGISTRY.with(|r| r.borrow_mut().reset());
}

/// Runs `f` with `registry` installed as the thread's default. Names drawn inside
/// `f` are recorded in `registry`; the previous default is restored afterwards.
pub fn with_registry<R>(registry: &mut NameRegistry, f: impl FnOnce() -> R) -> R {
    struct Restore<'a> {
        registry: &'a mut NameRegistry,
    }

    impl Drop for Restore<'_> {
        fn drop(&mut self) {
            REGISTRY.with(|r| std::mem::swap(&mut *r.borrow_mut(), self.registry));
        }
    }

    REGISTRY.with(|r| std::mem::swap(&mut *r.borrow_mut(), registry));
    let _restore = Restore { registry };
    f()
}

/// Lowercased type name without its module path: `LayerList` -> `layerlist`.
pub fn default_prefix<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LayerList;

    #[test]
    fn test_registry_sequence() {
        let mut reg = NameRegistry::new();
        assert_eq!(reg.next_name("dense"), "dense");
        assert_eq!(reg.next_name("dense"), "dense_1");
        assert_eq!(reg.next_name("conv"), "conv");
        assert_eq!(reg.next_name("dense"), "dense_2");

        reg.reset();
        assert_eq!(reg.next_name("dense"), "dense");
    }

    #[test]
    fn test_with_registry_isolates_and_restores() {
        reset_names();
        assert_eq!(next_name("flatten"), "flatten");

        let mut scoped = NameRegistry::new();
        let inner = with_registry(&mut scoped, || (next_name("flatten"), next_name("flatten")));
        assert_eq!(inner, ("flatten".to_string(), "flatten_1".to_string()));

        assert_eq!(next_name("flatten"), "flatten_1");
        assert_eq!(scoped.next_name("flatten"), "flatten_2");
    }

    #[test]
    fn test_default_prefix() {
        assert_eq!(default_prefix::<LayerList>(), "layerlist");
    }
}
