use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::matching::FactOptionalsToId;
use crate::utils::increment_last_number_until;
use crate::{Action, ActionId, Ontology, SetOfEvents, SetOfEventsId, SetOfFacts, Sym};

/// Everything the agent knows that does not change with the world: the
/// ontology, the actions, the event rules and the lookup caches built from
/// them.
///
/// The caches are rebuilt eagerly on every mutation, so readers (the planner)
/// always see a consistent frozen view.
#[derive(Clone, Default, Debug)]
pub struct Domain {
    name: Sym,
    ontology: Ontology,
    timeless_facts: SetOfFacts,
    actions: BTreeMap<ActionId, Action>,
    set_of_events: BTreeMap<SetOfEventsId, SetOfEvents>,
    requirements: BTreeSet<String>,
    /// Precondition atoms to the actions whose precondition carries them.
    condition_to_action_ids: FactOptionalsToId,
    /// Establishable atoms to the actions whose effects can produce them.
    effect_to_action_ids: FactOptionalsToId,
    actions_without_precondition: BTreeSet<ActionId>,
}

impl Domain {
    pub fn new(actions: BTreeMap<ActionId, Action>, ontology: Ontology) -> Domain {
        let mut domain = Domain {
            name: Sym::from("domain"),
            ontology,
            actions,
            ..Default::default()
        };
        domain.update_successions();
        domain
    }

    pub fn with_name(mut self, name: impl Into<Sym>) -> Domain {
        self.name = name.into();
        self
    }

    pub fn with_timeless_facts(mut self, timeless_facts: SetOfFacts) -> Domain {
        self.timeless_facts = timeless_facts;
        self
    }

    pub fn with_set_of_events(mut self, set_of_events: SetOfEvents) -> Domain {
        self.add_set_of_events(set_of_events, "soe");
        self
    }

    pub fn name(&self) -> &Sym {
        &self.name
    }

    pub fn ontology(&self) -> &Ontology {
        &self.ontology
    }

    pub fn timeless_facts(&self) -> &SetOfFacts {
        &self.timeless_facts
    }

    pub fn actions(&self) -> &BTreeMap<ActionId, Action> {
        &self.actions
    }

    pub fn action(&self, action_id: &str) -> Option<&Action> {
        self.actions.get(action_id)
    }

    /// Adds an action. If the identifier is already used the addition is not
    /// done.
    pub fn add_action(&mut self, action_id: impl Into<ActionId>, action: Action) {
        let action_id = action_id.into();
        if self.actions.contains_key(&action_id) {
            return;
        }
        self.actions.insert(action_id, action);
        self.update_successions();
    }

    /// Removes an action. Unknown identifiers are ignored.
    pub fn remove_action(&mut self, action_id: &str) {
        if self.actions.remove(action_id).is_some() {
            self.update_successions();
        }
    }

    pub fn set_of_events(&self) -> &BTreeMap<SetOfEventsId, SetOfEvents> {
        &self.set_of_events
    }

    /// Registers a set of events under the suggested identifier, uniquified
    /// if needed. Returns the identifier actually used.
    pub fn add_set_of_events(&mut self, mut set_of_events: SetOfEvents, suggested_id: &str) -> SetOfEventsId {
        let suggested_id = if suggested_id.is_empty() { "soe" } else { suggested_id };
        let id = increment_last_number_until(suggested_id, |candidate| !self.set_of_events.contains_key(candidate));
        set_of_events.rebuild_links(&self.ontology.types);
        self.set_of_events.insert(id.clone(), set_of_events);
        id
    }

    pub fn remove_set_of_events(&mut self, set_of_events_id: &str) {
        self.set_of_events.remove(set_of_events_id);
    }

    pub fn clear_events(&mut self) {
        self.set_of_events.clear();
    }

    pub fn add_requirement(&mut self, requirement: impl Into<String>) {
        self.requirements.insert(requirement.into());
    }

    pub fn requirements(&self) -> &BTreeSet<String> {
        &self.requirements
    }

    /// Index from precondition atoms to action identifiers.
    pub fn condition_to_action_ids(&self) -> &FactOptionalsToId {
        &self.condition_to_action_ids
    }

    /// Index from establishable literals to the actions that can establish
    /// them. This is the entry point of the backward search.
    pub fn effect_to_action_ids(&self) -> &FactOptionalsToId {
        &self.effect_to_action_ids
    }

    pub fn actions_without_precondition(&self) -> &BTreeSet<ActionId> {
        &self.actions_without_precondition
    }

    fn update_successions(&mut self) {
        debug!(actions = self.actions.len(), "rebuilding succession caches");
        self.condition_to_action_ids = FactOptionalsToId::new();
        self.effect_to_action_ids = FactOptionalsToId::new();
        self.actions_without_precondition = BTreeSet::new();
        for (action_id, action) in &self.actions {
            let mut has_precondition_atom = false;
            if let Some(precondition) = &action.precondition {
                has_precondition_atom =
                    self.condition_to_action_ids
                        .add_condition(precondition, action_id, &self.ontology.types);
            }
            if !has_precondition_atom {
                self.actions_without_precondition.insert(action_id.clone());
            }
            if let Some(effect) = &action.effect {
                self.effect_to_action_ids.add_effect(effect, action_id, &self.ontology.types);
            }
            if let Some(effect) = &action.at_start_effect {
                self.effect_to_action_ids.add_effect(effect, action_id, &self.ontology.types);
            }
        }
    }

    /// Renders, for each action, which other actions its effects can enable.
    pub fn print_succession_cache(&self) -> String {
        let mut lines = Vec::new();
        for (action_id, action) in &self.actions {
            let mut entries = Vec::new();
            let effects = [action.at_start_effect.as_ref(), action.effect.as_ref()];
            for effect in effects.into_iter().flatten() {
                effect.for_each_fact(&mut |optfact, _ignore_value| {
                    let successors: Vec<&String> = self
                        .condition_to_action_ids
                        .find(optfact)
                        .into_iter()
                        .filter(|successor| *successor != action_id)
                        .collect();
                    if !successors.is_empty() {
                        entries.push(format!(
                            "  {} -> {}",
                            optfact.to_pddl(false),
                            successors.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
                        ));
                    }
                });
            }
            if !entries.is_empty() {
                lines.push(format!("{action_id}:"));
                entries.sort();
                entries.dedup();
                lines.append(&mut entries);
            }
        }
        lines.join("\n")
    }
}
