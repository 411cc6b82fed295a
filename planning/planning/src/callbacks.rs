use std::collections::BTreeMap;
use std::fmt::Debug;
use std::rc::Rc;

use crate::conditions::Substitution;
use crate::matching::FactOptionalsToId;
use crate::types::SetOfTypes;
use crate::utils::increment_last_number_until;
use crate::{Condition, Param};

pub type CallbackId = String;

/// An observer: a handler invoked with the matching binding whenever its
/// condition newly holds after a world mutation. Observers never mutate the
/// world.
#[derive(Clone)]
pub struct ConditionToCallback {
    pub parameters: Vec<Param>,
    pub condition: Condition,
    pub callback: Rc<dyn Fn(&Substitution)>,
}

impl ConditionToCallback {
    pub fn new(condition: Condition, callback: impl Fn(&Substitution) + 'static) -> Self {
        Self {
            parameters: Vec::new(),
            condition,
            callback: Rc::new(callback),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<Param>) -> Self {
        self.parameters = parameters;
        self
    }
}

impl Debug for ConditionToCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConditionToCallback({})", self.condition)
    }
}

/// A frozen set of observers with the index used to wake them up.
#[derive(Clone, Default, Debug)]
pub struct SetOfCallbacks {
    callbacks: BTreeMap<CallbackId, ConditionToCallback>,
    conditions_to_ids: FactOptionalsToId,
}

impl SetOfCallbacks {
    pub fn new(callbacks: BTreeMap<CallbackId, ConditionToCallback>, types: &SetOfTypes) -> Self {
        let mut conditions_to_ids = FactOptionalsToId::new();
        for (id, callback) in &callbacks {
            conditions_to_ids.add_condition(&callback.condition, id, types);
        }
        Self {
            callbacks,
            conditions_to_ids,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn callbacks(&self) -> &BTreeMap<CallbackId, ConditionToCallback> {
        &self.callbacks
    }

    pub fn conditions_to_ids(&self) -> &FactOptionalsToId {
        &self.conditions_to_ids
    }
}

/// A set of observers that can still be extended. Registration hands back the
/// identifier to use for removal; [`MutableSetOfCallbacks::freeze`] produces
/// the read-only form consumed by the world state.
#[derive(Clone, Default, Debug)]
pub struct MutableSetOfCallbacks {
    callbacks: BTreeMap<CallbackId, ConditionToCallback>,
}

impl MutableSetOfCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, callback: ConditionToCallback) -> CallbackId {
        self.add_with_id(callback, "callback")
    }

    pub fn add_with_id(&mut self, callback: ConditionToCallback, suggested_id: &str) -> CallbackId {
        let suggested_id = if suggested_id.is_empty() { "callback" } else { suggested_id };
        let id = increment_last_number_until(suggested_id, |candidate| !self.callbacks.contains_key(candidate));
        self.callbacks.insert(id.clone(), callback);
        id
    }

    pub fn remove(&mut self, callback_id: &str) {
        self.callbacks.remove(callback_id);
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn freeze(&self, types: &SetOfTypes) -> SetOfCallbacks {
        SetOfCallbacks::new(self.callbacks.clone(), types)
    }
}
