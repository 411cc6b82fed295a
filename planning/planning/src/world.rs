use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use tracing::trace;

use crate::conditions::{EvalEnv, Substitution};
use crate::matching::{condition_bindings, unify_facts};
use crate::types::SetOfTypes;
use crate::{
    Effect, Entity, Fact, FactOptional, FluentExpr, Ontology, RealValue, SetOfCallbacks, SetOfEntities, SetOfEvents,
    SetOfEventsId,
};

/// Per-signature lookup lists of a [`SetOfFacts`].
#[derive(Clone, Debug)]
struct ParameterToValues {
    all: Vec<Fact>,
    /// For each argument position, a map from argument value to facts.
    arg_id_to_value_to_facts: Vec<hashbrown::HashMap<String, Vec<Fact>>>,
    /// Map from fluent value to facts.
    value_to_facts: hashbrown::HashMap<String, Vec<Fact>>,
}

impl ParameterToValues {
    fn new(num_args: usize) -> Self {
        Self {
            all: Vec::new(),
            arg_id_to_value_to_facts: vec![hashbrown::HashMap::new(); num_args],
            value_to_facts: hashbrown::HashMap::new(),
        }
    }
}

/// Mutable store of ground facts with multi-key lookup indexes: by exact call
/// (with and without fluent value) and by type-broadened signature with
/// per-argument value lists.
#[derive(Clone, Default)]
pub struct SetOfFacts {
    /// Fact to true if the fact is timeless.
    facts: BTreeMap<Fact, bool>,
    exact_call_to_facts: hashbrown::HashMap<String, Vec<Fact>>,
    exact_call_without_value_to_facts: hashbrown::HashMap<String, Vec<Fact>>,
    signature_to_facts: hashbrown::HashMap<String, ParameterToValues>,
    name_to_facts: hashbrown::HashMap<String, Vec<Fact>>,
}

impl SetOfFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facts(&self) -> &BTreeMap<Fact, bool> {
        &self.facts
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn has_fact(&self, fact: &Fact) -> bool {
        self.facts.contains_key(fact)
    }

    pub fn is_timeless(&self, fact: &Fact) -> bool {
        self.facts.get(fact).copied().unwrap_or(false)
    }

    /// Inserts a ground fact. An existing value of the same fluent is
    /// overwritten. Returns false if the store is unchanged.
    pub fn add(&mut self, fact: Fact, can_be_removed: bool, types: &SetOfTypes) -> bool {
        if self.facts.contains_key(&fact) {
            return false;
        }
        if fact.predicate().is_fluent() {
            // a fluent holds a single value at a time
            for previous in self.find(&fact, true) {
                if self.is_timeless(&previous) {
                    return false;
                }
                self.erase(&previous, types);
            }
        }
        self.index(&fact, types);
        self.facts.insert(fact, !can_be_removed);
        true
    }

    /// Removes a fact. Timeless facts refuse removal.
    pub fn erase(&mut self, fact: &Fact, types: &SetOfTypes) -> bool {
        match self.facts.get(fact) {
            None => return false,
            Some(true) => return false,
            Some(false) => {}
        }
        self.facts.remove(fact);
        self.unindex(fact, types);
        true
    }

    fn index(&mut self, fact: &Fact, types: &SetOfTypes) {
        self.exact_call_to_facts.entry(fact.exact_call()).or_default().push(fact.clone());
        self.exact_call_without_value_to_facts
            .entry(fact.exact_call_without_value())
            .or_default()
            .push(fact.clone());
        self.name_to_facts
            .entry(fact.name().canonical_string())
            .or_default()
            .push(fact.clone());
        for signature in fact.signatures(types) {
            let lists = self
                .signature_to_facts
                .entry(signature)
                .or_insert_with(|| ParameterToValues::new(fact.arguments().len()));
            lists.all.push(fact.clone());
            for (i, argument) in fact.arguments().iter().enumerate() {
                lists.arg_id_to_value_to_facts[i]
                    .entry(argument.value.canonical_string())
                    .or_default()
                    .push(fact.clone());
            }
            if let Some(value) = fact.value() {
                lists.value_to_facts
                    .entry(value.value.canonical_string())
                    .or_default()
                    .push(fact.clone());
            }
        }
    }

    fn unindex(&mut self, fact: &Fact, types: &SetOfTypes) {
        let remove_from = |list: &mut Vec<Fact>| list.retain(|f| f != fact);
        if let Some(list) = self.exact_call_to_facts.get_mut(&fact.exact_call()) {
            remove_from(list);
        }
        if let Some(list) = self.exact_call_without_value_to_facts.get_mut(&fact.exact_call_without_value()) {
            remove_from(list);
        }
        if let Some(list) = self.name_to_facts.get_mut(fact.name().canonical_str()) {
            remove_from(list);
        }
        for signature in fact.signatures(types) {
            if let Some(lists) = self.signature_to_facts.get_mut(&signature) {
                remove_from(&mut lists.all);
                for (i, argument) in fact.arguments().iter().enumerate() {
                    if let Some(list) = lists.arg_id_to_value_to_facts[i].get_mut(argument.value.canonical_str()) {
                        remove_from(list);
                    }
                }
                if let Some(value) = fact.value() {
                    if let Some(list) = lists.value_to_facts.get_mut(value.value.canonical_str()) {
                        remove_from(list);
                    }
                }
            }
        }
    }

    /// Candidate stored facts for the given (possibly lifted) fact, using the
    /// most selective available index. Callers are expected to unify.
    pub fn find(&self, fact: &Fact, ignore_value: bool) -> Vec<Fact> {
        let args_ground = !fact.arguments().iter().any(|a| a.is_a_param_to_fill());
        if args_ground {
            let value_is_exact = fact
                .value()
                .is_some_and(|v| !v.is_a_param_to_fill() && !v.is_undefined() && !fact.is_value_negated());
            if value_is_exact && !ignore_value {
                return self.exact_call_to_facts.get(&fact.exact_call()).cloned().unwrap_or_default();
            }
            return self
                .exact_call_without_value_to_facts
                .get(&fact.exact_call_without_value())
                .cloned()
                .unwrap_or_default();
        }

        if let Some(lists) = self.signature_to_facts.get(&fact.direct_signature()) {
            // prefer a ground argument position to narrow the list
            for (i, argument) in fact.arguments().iter().enumerate() {
                if !argument.is_a_param_to_fill() {
                    return lists.arg_id_to_value_to_facts[i]
                        .get(argument.value.canonical_str())
                        .cloned()
                        .unwrap_or_default();
                }
            }
            if !ignore_value {
                if let Some(value) = fact.value() {
                    if !value.is_a_param_to_fill() && !value.is_undefined() && !fact.is_value_negated() {
                        return lists.value_to_facts.get(value.value.canonical_str()).cloned().unwrap_or_default();
                    }
                }
            }
            return lists.all.clone();
        }

        // signature miss (e.g. untyped wildcard): fall back to the name index
        self.name_to_facts
            .get(fact.name().canonical_str())
            .map(|facts| {
                facts
                    .iter()
                    .filter(|f| f.arguments().len() == fact.arguments().len())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Value of a fluent in this store, or None when the fact is absent.
    pub fn fluent_value(&self, fact: &Fact) -> Option<Entity> {
        self.find(fact, true)
            .into_iter()
            .next()
            .and_then(|f| f.value().cloned())
    }

    /// The entities that can stand for `parameter` in facts matching the
    /// given lifted fact.
    pub fn extract_potential_arguments(&self, fact: &Fact, parameter: &str) -> BTreeSet<Entity> {
        let mut result = BTreeSet::new();
        for candidate in self.find(fact, true) {
            if unify_facts(fact, &candidate, &Substitution::new()).is_none() {
                continue;
            }
            for (lifted_arg, ground_arg) in fact.arguments().iter().zip(candidate.arguments().iter()) {
                if lifted_arg.is_param() && lifted_arg.value.canonical_str() == parameter {
                    result.insert(ground_arg.clone());
                }
            }
            if let (Some(lifted_value), Some(ground_value)) = (fact.value(), candidate.value()) {
                if lifted_value.is_param() && lifted_value.value.canonical_str() == parameter {
                    result.insert(ground_value.clone());
                }
            }
        }
        result
    }

    pub fn to_pddl(&self, indentation: usize, print_timeless: bool) -> String {
        let prefix = " ".repeat(indentation);
        self.facts
            .iter()
            .filter(|(_, timeless)| print_timeless || !**timeless)
            .map(|(fact, _)| format!("{prefix}{}", fact.to_pddl(false)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Debug for SetOfFacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SetOfFacts[")?;
        crate::utils::disp_iter(f, self.facts.keys(), ", ")?;
        write!(f, "]")
    }
}

/// The mutable world: a fact store plus the machinery that applies effects,
/// propagates events to fixed point and notifies observers.
#[derive(Clone, Default, Debug)]
pub struct WorldState {
    facts: SetOfFacts,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facts(&self) -> &SetOfFacts {
        &self.facts
    }

    pub fn has_fact(&self, fact: &Fact) -> bool {
        self.facts.has_fact(fact)
    }

    pub fn fluent_value(&self, fact: &Fact) -> Option<Entity> {
        self.facts.fluent_value(fact)
    }

    /// Injects a timeless fact; it will refuse later removal.
    pub fn add_timeless_fact(&mut self, fact: Fact, ontology: &Ontology) {
        self.facts.add(fact, false, &ontology.types);
    }

    pub fn add_fact(
        &mut self,
        fact: Fact,
        events: &BTreeMap<SetOfEventsId, SetOfEvents>,
        callbacks: &SetOfCallbacks,
        ontology: &Ontology,
        objects: &SetOfEntities,
    ) -> bool {
        self.modify(Some(&Effect::Add(fact)), events, callbacks, ontology, objects)
    }

    pub fn remove_fact(
        &mut self,
        fact: Fact,
        events: &BTreeMap<SetOfEventsId, SetOfEvents>,
        callbacks: &SetOfCallbacks,
        ontology: &Ontology,
        objects: &SetOfEntities,
    ) -> bool {
        self.modify(Some(&Effect::Delete(fact)), events, callbacks, ontology, objects)
    }

    /// Applies an effect as one atomic world step: effect, then events to
    /// fixed point, then callbacks once the world is quiescent.
    pub fn modify(
        &mut self,
        effect: Option<&Effect>,
        events: &BTreeMap<SetOfEventsId, SetOfEvents>,
        callbacks: &SetOfCallbacks,
        ontology: &Ontology,
        objects: &SetOfEntities,
    ) -> bool {
        let Some(effect) = effect else { return false };
        self.apply_all(&[Some(effect)], events, callbacks, ontology, objects)
    }

    /// Applies several effect trees (e.g. an action's at-start and main
    /// effects) as a single atomic step.
    pub fn apply_all(
        &mut self,
        effects: &[Option<&Effect>],
        events: &BTreeMap<SetOfEventsId, SetOfEvents>,
        callbacks: &SetOfCallbacks,
        ontology: &Ontology,
        objects: &SetOfEntities,
    ) -> bool {
        let pre = self.clone();
        let mut changed = Vec::new();
        for effect in effects.iter().flatten() {
            changed.extend(self.apply_step(effect, ontology, objects));
        }
        if changed.is_empty() {
            return false;
        }
        self.run_events(&mut changed, events, ontology, objects);
        self.notify_callbacks(&pre, &changed, callbacks, ontology, objects);
        true
    }

    /// Applies a single effect tree without event propagation and returns the
    /// changed literals. `when` conditions are read on the pre-step world.
    fn apply_step(&mut self, effect: &Effect, ontology: &Ontology, objects: &SetOfEntities) -> Vec<FactOptional> {
        let snapshot = self.clone();
        let mut changed = Vec::new();
        let mut deferred = Vec::new();
        self.walk_effect(effect, &snapshot, ontology, objects, &mut changed, &mut deferred);
        // conditional branches whose condition held before the step
        for body in deferred {
            let mut nested = Vec::new();
            self.walk_effect(&body, &snapshot, ontology, objects, &mut changed, &mut nested);
            // a single level of `when`: nested conditionals are evaluated
            // against the same pre-step world and applied immediately
            for nested_body in nested {
                self.walk_effect(&nested_body, &snapshot, ontology, objects, &mut changed, &mut Vec::new());
            }
        }
        changed
    }

    fn walk_effect(
        &mut self,
        effect: &Effect,
        snapshot: &WorldState,
        ontology: &Ontology,
        objects: &SetOfEntities,
        changed: &mut Vec<FactOptional>,
        deferred: &mut Vec<Effect>,
    ) {
        match effect {
            Effect::Add(fact) => {
                if fact.has_a_param_to_fill() {
                    return;
                }
                if fact.value().is_some_and(|v| v.is_undefined()) {
                    self.delete_matching(fact, ontology, changed);
                } else {
                    self.insert(fact.clone(), ontology, changed);
                }
            }
            Effect::Delete(fact) => self.delete_matching(fact, ontology, changed),
            Effect::Assign(fact, value) => {
                let value = self.resolve_fluent_expr(value);
                match value {
                    Some(value) if !value.is_undefined() => {
                        let mut fact = fact.clone();
                        fact.set_value(Some(value));
                        if !fact.has_a_param_to_fill() {
                            self.insert(fact, ontology, changed);
                        }
                    }
                    _ => self.delete_matching(fact, ontology, changed),
                }
            }
            Effect::Increase(fact, delta) => self.arith(fact, delta, ontology, changed, |cur, d| cur + d),
            Effect::Decrease(fact, delta) => self.arith(fact, delta, ontology, changed, |cur, d| cur - d),
            Effect::And(items) => {
                for item in items {
                    self.walk_effect(item, snapshot, ontology, objects, changed, deferred);
                }
            }
            Effect::When(condition, body) => {
                let env = EvalEnv {
                    world: snapshot,
                    ontology,
                    objects,
                };
                if condition.is_true(env, None) {
                    deferred.push(body.as_ref().clone());
                }
            }
            Effect::Forall(param, body) => {
                let mut domain = ontology.constants.entities_of_type(param.tpe());
                for entity in objects.entities_of_type(param.tpe()) {
                    if !domain.iter().any(|e| e.value == entity.value) {
                        domain.push(entity);
                    }
                }
                let expanded: Vec<Effect> = domain
                    .into_iter()
                    .map(|entity| {
                        let mut subst = Substitution::new();
                        subst.insert(param.clone(), entity.clone());
                        body.replace_parameters(&subst)
                    })
                    .collect();
                for instance in expanded {
                    self.walk_effect(&instance, snapshot, ontology, objects, changed, deferred);
                }
            }
        }
    }

    fn insert(&mut self, fact: Fact, ontology: &Ontology, changed: &mut Vec<FactOptional>) {
        if fact.predicate().is_fluent() {
            for previous in self.facts.find(&fact, true) {
                if previous != fact && self.facts.erase(&previous, &ontology.types) {
                    changed.push(FactOptional::negated(previous));
                }
            }
        }
        if self.facts.add(fact.clone(), true, &ontology.types) {
            changed.push(FactOptional::positive(fact));
        }
    }

    fn delete_matching(&mut self, fact: &Fact, ontology: &Ontology, changed: &mut Vec<FactOptional>) {
        let empty = Substitution::new();
        for candidate in self.facts.find(fact, true) {
            let mut probe = fact.clone();
            probe.set_value(candidate.value().cloned());
            if unify_facts(&probe, &candidate, &empty).is_some() && self.facts.erase(&candidate, &ontology.types) {
                changed.push(FactOptional::negated(candidate));
            }
        }
    }

    fn resolve_fluent_expr(&self, value: &FluentExpr) -> Option<Entity> {
        match value {
            FluentExpr::Number(n) => Some(Entity::from_number(*n)),
            FluentExpr::Entity(entity) => Some(entity.clone()),
            FluentExpr::Read(fact) => self.fluent_value(fact),
        }
    }

    fn arith(
        &mut self,
        fact: &Fact,
        delta: &FluentExpr,
        ontology: &Ontology,
        changed: &mut Vec<FactOptional>,
        op: impl Fn(RealValue, RealValue) -> RealValue,
    ) {
        let current = self
            .fluent_value(fact)
            .and_then(|v| v.number_value())
            .unwrap_or_else(|| RealValue::new(0, 1));
        let delta = match self.resolve_fluent_expr(delta).and_then(|v| v.number_value()) {
            Some(delta) => delta,
            None => return,
        };
        let mut fact = fact.clone();
        fact.set_value(Some(Entity::from_number(op(current, delta))));
        if !fact.has_a_param_to_fill() {
            self.insert(fact, ontology, changed);
        }
    }

    /// Fires events whose preconditions could have been made true by the
    /// changed literals, repeating until no event fires. The same event with
    /// the same binding fires at most once per mutation.
    fn run_events(
        &mut self,
        changed: &mut Vec<FactOptional>,
        events: &BTreeMap<SetOfEventsId, SetOfEvents>,
        ontology: &Ontology,
        objects: &SetOfEntities,
    ) {
        let mut fired: BTreeSet<(String, String, String)> = BTreeSet::new();
        let mut frontier: Vec<FactOptional> = changed.clone();
        while !frontier.is_empty() {
            let mut new_changed: Vec<FactOptional> = Vec::new();
            for (set_id, set_of_events) in events {
                let mut candidates: BTreeSet<&String> = BTreeSet::new();
                for literal in &frontier {
                    candidates.extend(set_of_events.reachable_event_links().find(literal));
                }
                for event_id in candidates {
                    let Some(event) = set_of_events.events().get(event_id) else { continue };
                    let env = EvalEnv {
                        world: self,
                        ontology,
                        objects,
                    };
                    let bindings =
                        condition_bindings(&event.precondition, env, &event.parameters, &Substitution::new());
                    for binding in bindings {
                        let binding_key = binding
                            .iter()
                            .map(|(p, e)| format!("{p}={e}"))
                            .collect::<Vec<_>>()
                            .join(",");
                        if !fired.insert((set_id.clone(), event_id.clone(), binding_key)) {
                            continue;
                        }
                        trace!(event = %event_id, "firing event");
                        let effect = event.effect.replace_parameters(&binding);
                        new_changed.extend(self.apply_step(&effect, ontology, objects));
                    }
                }
            }
            changed.extend(new_changed.iter().cloned());
            frontier = new_changed;
        }
    }

    /// Invokes the observers whose condition newly holds, with the matching
    /// binding. Observers do not mutate the world.
    fn notify_callbacks(
        &self,
        pre: &WorldState,
        changed: &[FactOptional],
        callbacks: &SetOfCallbacks,
        ontology: &Ontology,
        objects: &SetOfEntities,
    ) {
        if callbacks.is_empty() {
            return;
        }
        let mut candidates: BTreeSet<&String> = BTreeSet::new();
        for literal in changed {
            candidates.extend(callbacks.conditions_to_ids().find(literal));
        }
        for callback_id in candidates {
            let Some(entry) = callbacks.callbacks().get(callback_id) else { continue };
            let pre_env = EvalEnv {
                world: pre,
                ontology,
                objects,
            };
            let now_env = EvalEnv {
                world: self,
                ontology,
                objects,
            };
            if entry.condition.is_true(pre_env, None) {
                continue;
            }
            for binding in condition_bindings(&entry.condition, now_env, &entry.parameters, &Substitution::new()) {
                (entry.callback)(&binding);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pddl::convert::{pddl_to_condition, pddl_to_effect, pddl_to_fact};
    use crate::{SetOfPredicates, SetOfTypes};

    fn fixture() -> (Ontology, SetOfEntities) {
        let mut ontology = Ontology::default();
        ontology.types = SetOfTypes::from_pddl("ent").unwrap();
        ontology.constants = SetOfEntities::from_pddl("e1 e2 - ent", &ontology.types).unwrap();
        ontology.predicates = SetOfPredicates::from_str(
            "visited(?e - ent)\nswitched\ncounter() - number\nowner() - ent",
            &ontology.types,
        )
        .unwrap();
        (ontology, SetOfEntities::new())
    }

    fn apply(world: &mut WorldState, effect: &str, ontology: &Ontology, objects: &SetOfEntities) -> bool {
        let effect = pddl_to_effect(effect, ontology, objects, &[]).unwrap();
        world.modify(
            Some(&effect),
            &BTreeMap::new(),
            &crate::SetOfCallbacks::default(),
            ontology,
            objects,
        )
    }

    fn holds(world: &WorldState, fact: &str, ontology: &Ontology, objects: &SetOfEntities) -> bool {
        let condition = pddl_to_condition(fact, ontology, objects, &[]).unwrap();
        condition.is_true(
            EvalEnv {
                world,
                ontology,
                objects,
            },
            None,
        )
    }

    #[test]
    fn add_delete_are_idempotent() {
        let (ontology, objects) = fixture();
        let mut world = WorldState::new();

        assert!(apply(&mut world, "(visited e1)", &ontology, &objects));
        // re-adding the same fact does not change the world
        assert!(!apply(&mut world, "(visited e1)", &ontology, &objects));
        assert!(holds(&world, "(visited e1)", &ontology, &objects));

        assert!(apply(&mut world, "(not (visited e1))", &ontology, &objects));
        assert!(!apply(&mut world, "(not (visited e1))", &ontology, &objects));
        assert!(!holds(&world, "(visited e1)", &ontology, &objects));
    }

    #[test]
    fn fluents_hold_a_single_value() {
        let (ontology, objects) = fixture();
        let mut world = WorldState::new();

        assert!(apply(&mut world, "(assign (owner) e1)", &ontology, &objects));
        assert!(apply(&mut world, "(assign (owner) e2)", &ontology, &objects));
        assert!(holds(&world, "(= (owner) e2)", &ontology, &objects));
        assert!(!holds(&world, "(= (owner) e1)", &ontology, &objects));
        assert_eq!(world.facts().facts().len(), 1);

        // assigning `undefined` forgets the value entirely
        assert!(apply(&mut world, "(assign (owner) undefined)", &ontology, &objects));
        assert!(world.facts().is_empty());
        assert!(holds(&world, "(= (owner) undefined)", &ontology, &objects));
    }

    #[test]
    fn arithmetic_reads_zero_when_absent() {
        let (ontology, objects) = fixture();
        let mut world = WorldState::new();

        assert!(apply(&mut world, "(increase (counter) 2)", &ontology, &objects));
        assert!(holds(&world, "(= (counter) 2)", &ontology, &objects));
        assert!(apply(&mut world, "(decrease (counter) 5)", &ontology, &objects));
        assert!(holds(&world, "(= (counter) -3)", &ontology, &objects));
        assert!(holds(&world, "(< (counter) 0)", &ontology, &objects));
        assert!(!holds(&world, "(> (counter) 0)", &ontology, &objects));
    }

    #[test]
    fn when_branches_read_the_pre_step_world() {
        let (ontology, objects) = fixture();
        let mut world = WorldState::new();

        // the condition of the second branch refers to a fact added by the
        // first one: it must not see it
        apply(
            &mut world,
            "(and (switched) (when (switched) (visited e1)))",
            &ontology,
            &objects,
        );
        assert!(holds(&world, "(switched)", &ontology, &objects));
        assert!(!holds(&world, "(visited e1)", &ontology, &objects));

        // on a second application the condition held before the step
        apply(
            &mut world,
            "(and (switched) (when (switched) (visited e1)))",
            &ontology,
            &objects,
        );
        assert!(holds(&world, "(visited e1)", &ontology, &objects));
    }

    #[test]
    fn forall_effects_cover_the_typed_domain() {
        let (ontology, objects) = fixture();
        let mut world = WorldState::new();

        apply(&mut world, "(forall (?e - ent) (visited ?e))", &ontology, &objects);
        assert!(holds(&world, "(visited e1)", &ontology, &objects));
        assert!(holds(&world, "(visited e2)", &ontology, &objects));
        assert!(holds(&world, "(forall (?e - ent) (visited ?e))", &ontology, &objects));
    }

    #[test]
    fn timeless_facts_refuse_removal() {
        let (ontology, objects) = fixture();
        let mut world = WorldState::new();

        let fact = pddl_to_fact("(visited e1)", &ontology, &objects, &[]).unwrap();
        world.add_timeless_fact(fact, &ontology);
        assert!(!apply(&mut world, "(not (visited e1))", &ontology, &objects));
        assert!(holds(&world, "(visited e1)", &ontology, &objects));
    }

    #[test]
    fn potential_arguments_extraction() {
        let (ontology, objects) = fixture();
        let mut world = WorldState::new();
        apply(&mut world, "(visited e1)", &ontology, &objects);
        apply(&mut world, "(visited e2)", &ontology, &objects);

        let types = &ontology.types;
        let param = crate::Param::new("?e", Some(types.name_to_type("ent").unwrap()));
        let lifted = pddl_to_fact("(visited ?e)", &ontology, &objects, &[param]).unwrap();
        let arguments = world.facts().extract_potential_arguments(&lifted, "?e");
        let values: Vec<&str> = arguments.iter().map(|e| e.value.canonical_str()).collect();
        assert_eq!(values, vec!["e1", "e2"]);
    }
}
