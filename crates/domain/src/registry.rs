//! Flattening strategies for user types that cannot flatten themselves

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::model::{Object, Value};

type Flattener = Box<dyn Fn(&dyn Any) -> Option<Value> + Send + Sync>;

/// Maps concrete [`Object`] types to a flattening function
#[derive(Default)]
pub struct FlattenRegistry {
    entries: HashMap<TypeId, (String, Flattener)>,
}

impl FlattenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register how to flatten values of type `T`
    ///
    /// A later registration for the same type replaces the earlier one.
    pub fn register<T, F>(&mut self, flatten: F) -> &mut Self
    where
        T: Object,
        F: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let flattener: Flattener = Box::new(move |any| any.downcast_ref::<T>().map(&flatten));
        self.entries.insert(
            TypeId::of::<T>(),
            (std::any::type_name::<T>().to_string(), flattener),
        );
        self
    }

    pub fn contains<T: Object>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten `object` with its registered strategy, if any
    pub fn flatten(&self, object: &dyn Object) -> Option<Value> {
        let any = object.as_any();
        let (_, flatten) = self.entries.get(&any.type_id())?;
        flatten(any)
    }
}

impl fmt::Debug for FlattenRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.entries.values().map(|(name, _)| name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Interval {
        low: i64,
        high: i64,
    }

    impl Object for Interval {
        fn type_name(&self) -> &str {
            "Interval"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct Unregistered;

    impl Object for Unregistered {
        fn type_name(&self) -> &str {
            "Unregistered"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_registered_type_flattens() {
        let mut registry = FlattenRegistry::new();
        registry.register(|i: &Interval| Value::tuple([i.low, i.high]));

        assert!(registry.contains::<Interval>());
        assert_eq!(registry.len(), 1);

        let flattened = registry.flatten(&Interval { low: 1, high: 5 });
        assert!(matches!(flattened, Some(Value::Tuple(ref parts)) if parts.len() == 2));
    }

    #[test]
    fn test_unregistered_type_is_none() {
        let mut registry = FlattenRegistry::new();
        registry.register(|i: &Interval| Value::tuple([i.low, i.high]));

        assert!(registry.flatten(&Unregistered).is_none());
        assert!(!registry.contains::<Unregistered>());
    }
}
