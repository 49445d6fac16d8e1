use std::any::Any;
use std::collections::HashMap;

use crate::decl::{
    CollectedKeyRef, CollectedParamRef, CounterRef, DeclId, ErasedValue, FlagRef, KeyRef, ParamRef,
};

/// One converted key value together with the token it came from.
#[derive(Debug)]
pub struct BoundValue {
    raw: String,
    value: ErasedValue,
}

impl BoundValue {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &*self.value
    }
}

#[derive(Debug)]
enum Binding {
    Flag(bool),
    Counter(u32),
    Values(Vec<BoundValue>),
    Tokens(Vec<String>),
}

/// Result of one parse: declaration id -> bound state.
///
/// Declarations that never matched have no entry; the typed getters fall back
/// to the declaration's default (flags), zero (counters) or empty.
#[derive(Debug, Default)]
pub struct Bindings {
    entries: HashMap<DeclId, Binding>,
}

impl Bindings {
    pub fn flag(&self, flag: FlagRef) -> bool {
        self.flag_state(flag.id()).unwrap_or(flag.default_value())
    }

    pub fn count(&self, counter: CounterRef) -> u32 {
        self.count_of(counter.id())
    }

    pub fn value<T: 'static>(&self, key: KeyRef<T>) -> Option<&T> {
        self.typed::<T>(key.id()).pop()
    }

    pub fn values<T: 'static>(&self, key: CollectedKeyRef<T>) -> Vec<&T> {
        self.typed::<T>(key.id())
    }

    pub fn param(&self, param: ParamRef) -> Option<&str> {
        match self.entries.get(&param.id()) {
            Some(Binding::Tokens(tokens)) => tokens.first().map(String::as_str),
            _ => None,
        }
    }

    pub fn collected(&self, param: CollectedParamRef) -> &[String] {
        match self.entries.get(&param.id()) {
            Some(Binding::Tokens(tokens)) => tokens.as_slice(),
            _ => &[],
        }
    }

    /// Whether the declaration ended up in a non-default state: a flag that was
    /// passed, a counter above zero, or a key/parameter with at least one value.
    pub fn is_present(&self, id: DeclId) -> bool {
        match self.entries.get(&id) {
            None => false,
            Some(Binding::Flag(_)) => true,
            Some(Binding::Counter(n)) => *n > 0,
            Some(Binding::Values(values)) => !values.is_empty(),
            Some(Binding::Tokens(tokens)) => !tokens.is_empty(),
        }
    }

    /// Explicit flag value, if the flag was passed.
    pub fn flag_state(&self, id: DeclId) -> Option<bool> {
        match self.entries.get(&id) {
            Some(Binding::Flag(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn count_of(&self, id: DeclId) -> u32 {
        match self.entries.get(&id) {
            Some(Binding::Counter(n)) => *n,
            _ => 0,
        }
    }

    /// Key values (converted) bound to `id`, in the order they were seen.
    pub fn bound_values(&self, id: DeclId) -> &[BoundValue] {
        match self.entries.get(&id) {
            Some(Binding::Values(values)) => values.as_slice(),
            _ => &[],
        }
    }

    /// Key values downcast to `T`. Values of another type are skipped.
    pub fn typed<T: 'static>(&self, id: DeclId) -> Vec<&T> {
        self.bound_values(id)
            .iter()
            .filter_map(BoundValue::downcast_ref::<T>)
            .collect()
    }

    /// Raw tokens bound to a key or parameter, in order.
    pub fn raw(&self, id: DeclId) -> Vec<&str> {
        match self.entries.get(&id) {
            Some(Binding::Values(values)) => values.iter().map(BoundValue::raw).collect(),
            Some(Binding::Tokens(tokens)) => tokens.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Bindings {
    pub(crate) fn set_flag(&mut self, id: DeclId, value: bool) {
        self.entries.insert(id, Binding::Flag(value));
    }

    pub(crate) fn bump_counter(&mut self, id: DeclId) {
        let entry = self.entries.entry(id).or_insert(Binding::Counter(0));
        if let Binding::Counter(n) = entry {
            *n = n.saturating_add(1);
        }
    }

    pub(crate) fn has_value(&self, id: DeclId) -> bool {
        !self.bound_values(id).is_empty()
    }

    pub(crate) fn push_value(&mut self, id: DeclId, raw: String, value: ErasedValue) {
        let entry = self
            .entries
            .entry(id)
            .or_insert_with(|| Binding::Values(Vec::new()));
        if let Binding::Values(values) = entry {
            values.push(BoundValue { raw, value });
        }
    }

    pub(crate) fn push_token(&mut self, id: DeclId, token: String) {
        let entry = self
            .entries
            .entry(id)
            .or_insert_with(|| Binding::Tokens(Vec::new()));
        if let Binding::Tokens(tokens) = entry {
            tokens.push(token);
        }
    }
}
