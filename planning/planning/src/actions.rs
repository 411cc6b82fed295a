use std::collections::BTreeMap;

use crate::matching::FactOptionalsToId;
use crate::types::SetOfTypes;
use crate::utils::increment_last_number_until;
use crate::{Condition, Effect, Param};

pub type ActionId = String;
pub type EventId = String;
pub type SetOfEventsId = String;

/// An operator of the domain: what the agent can do.
#[derive(Clone, Debug, Default)]
pub struct Action {
    pub parameters: Vec<Param>,
    pub precondition: Option<Condition>,
    /// Condition that must hold for the whole execution of the action.
    pub over_all_condition: Option<Condition>,
    /// Effect applied when the action completes.
    pub effect: Option<Effect>,
    /// Effect applied as soon as the action starts.
    pub at_start_effect: Option<Effect>,
    pub cost: u32,
}

impl Action {
    pub fn new(precondition: Option<Condition>, effect: Option<Effect>) -> Action {
        Action {
            parameters: Vec::new(),
            precondition,
            over_all_condition: None,
            effect,
            at_start_effect: None,
            cost: 1,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<Param>) -> Action {
        self.parameters = parameters;
        self
    }

    pub fn with_at_start_effect(mut self, effect: Option<Effect>) -> Action {
        self.at_start_effect = effect;
        self
    }

    pub fn with_cost(mut self, cost: u32) -> Action {
        self.cost = cost;
        self
    }

    /// True when the precondition mentions no atom at all.
    pub fn has_no_precondition_atom(&self) -> bool {
        match &self.precondition {
            None => true,
            Some(condition) => {
                let mut any = false;
                condition.for_each_fact(&mut |_, _| any = true);
                !any
            }
        }
    }
}

/// A rule fired by the world state after every mutation whose precondition
/// newly holds.
#[derive(Clone, Debug)]
pub struct Event {
    pub parameters: Vec<Param>,
    pub precondition: Condition,
    pub effect: Effect,
}

impl Event {
    pub fn new(precondition: Condition, effect: Effect) -> Event {
        Event {
            parameters: Vec::new(),
            precondition,
            effect,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<Param>) -> Event {
        self.parameters = parameters;
        self
    }
}

/// Container of a set of events, with the index from precondition atoms to
/// the events they can wake up.
#[derive(Clone, Default, Debug)]
pub struct SetOfEvents {
    events: BTreeMap<EventId, Event>,
    reachable_event_links: FactOptionalsToId,
    /// Establishable literals to the events whose effect can produce them.
    effect_to_event_ids: FactOptionalsToId,
}

impl SetOfEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event under the suggested identifier, uniquified if needed.
    /// Returns the identifier actually used.
    pub fn add(&mut self, event: Event, suggested_id: &str, types: &SetOfTypes) -> EventId {
        let suggested_id = if suggested_id.is_empty() { "event" } else { suggested_id };
        let id = increment_last_number_until(suggested_id, |candidate| !self.events.contains_key(candidate));
        self.reachable_event_links.add_condition(&event.precondition, &id, types);
        self.effect_to_event_ids.add_effect(&event.effect, &id, types);
        self.events.insert(id.clone(), event);
        id
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &BTreeMap<EventId, Event> {
        &self.events
    }

    pub fn reachable_event_links(&self) -> &FactOptionalsToId {
        &self.reachable_event_links
    }

    pub fn effect_to_event_ids(&self) -> &FactOptionalsToId {
        &self.effect_to_event_ids
    }

    /// Rebuilds the link indexes against the types of the owning domain.
    pub(crate) fn rebuild_links(&mut self, types: &SetOfTypes) {
        self.reachable_event_links = FactOptionalsToId::new();
        self.effect_to_event_ids = FactOptionalsToId::new();
        for (id, event) in &self.events {
            self.reachable_event_links.add_condition(&event.precondition, id, types);
            self.effect_to_event_ids.add_effect(&event.effect, id, types);
        }
    }
}

impl From<Event> for SetOfEvents {
    fn from(event: Event) -> Self {
        let mut set = SetOfEvents::new();
        // the index is rebuilt with proper types when registered in a domain
        set.add(event, "event", &SetOfTypes::new());
        set
    }
}
