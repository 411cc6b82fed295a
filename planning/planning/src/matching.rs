use std::collections::BTreeSet;

use crate::conditions::{EvalEnv, FactVisit, Substitution};
use crate::types::SetOfTypes;
use crate::{
    Condition, Effect, Entity, Fact, FactOptional, Param, ParameterValuesWithConstraints, WorldState,
    unfold_map_with_set,
};

/// Tries to extend `binding` so that the (possibly lifted) fact matches the
/// ground fact. Variables accept any entity of a compatible type, constants
/// must be equal and the wildcard accepts anything.
pub fn unify_facts(lifted: &Fact, ground: &Fact, binding: &Substitution) -> Option<Substitution> {
    if lifted.name() != ground.name() || lifted.arguments().len() != ground.arguments().len() {
        return None;
    }
    let mut extended = binding.clone();

    let mut unify_slot = |lifted: &Entity, ground: &Entity, extended: &mut Substitution| -> bool {
        if lifted.is_any() {
            return true;
        }
        if lifted.is_param() {
            let param = Param::new(lifted.value.clone(), lifted.tpe.clone());
            if let Some(bound) = extended.get(&param) {
                return bound.value == ground.value;
            }
            if let (Some(expected), Some(actual)) = (&lifted.tpe, &ground.tpe) {
                if !actual.is_a(expected) {
                    return false;
                }
            }
            extended.insert(param, ground.clone());
            return true;
        }
        lifted.value == ground.value
    };

    for (lifted_arg, ground_arg) in lifted.arguments().iter().zip(ground.arguments().iter()) {
        if !unify_slot(lifted_arg, ground_arg, &mut extended) {
            return None;
        }
    }

    match (lifted.value(), ground.value()) {
        (None, None) => {}
        (Some(lifted_value), Some(ground_value)) => {
            if lifted.is_value_negated() {
                // `f != v` accepts any stored value other than v
                let v = if lifted_value.is_param() {
                    extended
                        .get(&Param::new(lifted_value.value.clone(), None))
                        .map(|e| e.value.clone())
                } else {
                    Some(lifted_value.value.clone())
                };
                match v {
                    Some(v) => {
                        if ground_value.value == v {
                            return None;
                        }
                    }
                    None => return None,
                }
            } else if !unify_slot(lifted_value, ground_value, &mut extended) {
                return None;
            }
        }
        _ => return None,
    }
    Some(extended)
}

/// Does this (possibly lifted) optional fact hold in the world? Remaining
/// variables are read existentially.
pub fn holds_in_world(optfact: &FactOptional, world: &WorldState) -> bool {
    let fact = &optfact.fact;
    // a fluent valued `undefined` stands for the absence of the fact
    if fact.value().is_some_and(|v| v.is_undefined()) {
        let present = !world.facts().find(fact, true).is_empty();
        return if optfact.is_negated { present } else { !present };
    }
    let empty = Substitution::new();
    let matched = world
        .facts()
        .find(fact, false)
        .into_iter()
        .any(|candidate| unify_facts(fact, &candidate, &empty).is_some());
    if optfact.is_negated { !matched } else { matched }
}

/// All extensions of `base` under which the positive fact matches a world fact.
pub fn matches_in_world(fact: &Fact, world: &WorldState, base: &Substitution) -> Vec<Substitution> {
    let mut fact = fact.clone();
    fact.replace_arguments(base);
    let mut result = BTreeSet::new();
    for candidate in world.facts().find(&fact, false) {
        if let Some(binding) = unify_facts(&fact, &candidate, base) {
            result.insert(binding);
        }
    }
    result.into_iter().collect()
}

/// Candidate values for each parameter, extracted by unifying the positive
/// atoms of the condition against the world. Entities picked up in the same
/// atom constrain one another.
pub fn condition_parameter_candidates(
    condition: &Condition,
    env: EvalEnv,
    params: &[Param],
    base: &Substitution,
) -> ParameterValuesWithConstraints {
    let mut candidates = ParameterValuesWithConstraints::new();
    condition.for_each_fact(&mut |optfact, ctx: FactVisit| {
        if optfact.is_negated != ctx.negated_context {
            // only positive atoms pin parameters to existing facts
            return;
        }
        let mut lifted = optfact.fact.clone();
        lifted.replace_arguments(base);
        for ground in env.world.facts().find(&lifted, ctx.ignore_value) {
            let Some(binding) = unify_facts(&lifted, &ground, base) else {
                continue;
            };
            for param in params {
                let Some(entity) = binding.get(param) else { continue };
                if base.contains_key(param) {
                    continue;
                }
                let constraints = candidates
                    .entry(param.clone())
                    .or_default()
                    .entry(entity.clone())
                    .or_default();
                for other in params {
                    if other == param || base.contains_key(other) {
                        continue;
                    }
                    if let Some(other_entity) = binding.get(other) {
                        constraints.entry(other.clone()).or_default().insert(other_entity.clone());
                    }
                }
            }
        }
    });
    candidates
}

/// All ground bindings of `params` under which the condition holds.
pub fn condition_bindings(
    condition: &Condition,
    env: EvalEnv,
    params: &[Param],
    base: &Substitution,
) -> Vec<Substitution> {
    let free: Vec<&Param> = params.iter().filter(|p| !base.contains_key(*p)).collect();
    if free.is_empty() {
        return if condition.is_true(env, Some(base)) {
            vec![base.clone()]
        } else {
            Vec::new()
        };
    }

    let mut candidates = condition_parameter_candidates(condition, env, params, base);
    // parameters not pinned by any positive atom range over their typed domain
    for param in &free {
        let slot = candidates.entry((*param).clone()).or_default();
        if slot.is_empty() {
            let mut domain = env.ontology.constants.entities_of_type(param.tpe());
            for entity in env.objects.entities_of_type(param.tpe()) {
                if !domain.iter().any(|e| e.value == entity.value) {
                    domain.push(entity);
                }
            }
            for entity in domain {
                slot.entry(entity.clone()).or_default();
            }
        }
    }

    let mut result = Vec::new();
    for assignment in unfold_map_with_set(&candidates) {
        let mut binding = base.clone();
        binding.extend(assignment);
        if condition.is_true(env, Some(&binding)) && !result.contains(&binding) {
            result.push(binding);
        }
    }
    result
}

#[derive(Clone, Default, Debug)]
struct FactsToId {
    signature_to_ids: hashbrown::HashMap<String, BTreeSet<String>>,
}

impl FactsToId {
    fn add(&mut self, fact: &Fact, id: &str, types: &SetOfTypes) {
        for signature in fact.signatures(types) {
            self.signature_to_ids.entry(signature).or_default().insert(id.to_string());
        }
    }

    fn find(&self, fact: &Fact) -> Option<&BTreeSet<String>> {
        self.signature_to_ids.get(&fact.direct_signature())
    }
}

/// Index from condition (or effect) atoms to the ids that carry them, split
/// by polarity and keyed by type-broadened signatures. This is what gives the
/// planner its O(1) "which actions could establish this literal" lookup.
#[derive(Clone, Default, Debug)]
pub struct FactOptionalsToId {
    facts_to_ids: FactsToId,
    not_facts_to_ids: FactsToId,
}

impl FactOptionalsToId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_fact(&mut self, optfact: &FactOptional, negated_context: bool, id: &str, types: &SetOfTypes) {
        let negated = optfact.is_negated != negated_context;
        if negated {
            self.not_facts_to_ids.add(&optfact.fact, id, types);
        } else {
            self.facts_to_ids.add(&optfact.fact, id, types);
        }
    }

    /// Indexes every atom reachable in the condition. Returns false when the
    /// condition contains no atom at all.
    pub fn add_condition(&mut self, condition: &Condition, id: &str, types: &SetOfTypes) -> bool {
        let mut any = false;
        condition.for_each_fact(&mut |optfact, ctx| {
            any = true;
            self.add_fact(optfact, ctx.negated_context, id, types);
        });
        any
    }

    /// Indexes every fact the effect can establish or retract.
    pub fn add_effect(&mut self, effect: &Effect, id: &str, types: &SetOfTypes) {
        effect.for_each_fact(&mut |optfact, _ignore_value| {
            self.add_fact(optfact, false, id, types);
        });
    }

    /// Ids whose indexed atoms could match the given literal, in id order.
    pub fn find(&self, optfact: &FactOptional) -> Vec<&String> {
        let side = if optfact.is_negated {
            &self.not_facts_to_ids
        } else {
            &self.facts_to_ids
        };
        side.find(&optfact.fact).map(|ids| ids.iter().collect()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pddl::convert::{pddl_to_condition, pddl_to_effect, pddl_to_fact, pddl_to_parameters};
    use crate::{Ontology, SetOfCallbacks, SetOfEntities, SetOfPredicates};

    fn fixture() -> (Ontology, SetOfEntities, WorldState) {
        let mut ontology = Ontology::default();
        ontology.types = SetOfTypes::from_pddl("location robot - physical").unwrap();
        ontology.constants = SetOfEntities::from_pddl("kitchen bedroom - location\nr1 r2 - robot", &ontology.types).unwrap();
        ontology.predicates = SetOfPredicates::from_str("at(?r - robot, ?l - location)\ncharged(?r - robot)", &ontology.types).unwrap();

        let objects = SetOfEntities::new();
        let mut world = WorldState::new();
        let callbacks = SetOfCallbacks::default();
        for fact in ["(at r1 kitchen)", "(at r2 bedroom)", "(charged r2)"] {
            let fact = pddl_to_fact(fact, &ontology, &objects, &[]).unwrap();
            world.add_fact(fact, &std::collections::BTreeMap::new(), &callbacks, &ontology, &objects);
        }
        (ontology, objects, world)
    }

    #[test]
    fn lifted_facts_unify_with_the_world() {
        let (ontology, objects, world) = fixture();
        let params = pddl_to_parameters("(?r - robot ?l - location)", &ontology.types).unwrap();
        let lifted = pddl_to_fact("(at ?r ?l)", &ontology, &objects, &params).unwrap();

        let bindings = matches_in_world(&lifted, &world, &Substitution::new());
        assert_eq!(bindings.len(), 2);
        let rendered: Vec<String> = bindings
            .iter()
            .map(|b| b.iter().map(|(p, e)| format!("{p}={e}")).collect::<Vec<_>>().join(","))
            .collect();
        assert_eq!(rendered, vec!["?l=bedroom,?r=r2", "?l=kitchen,?r=r1"]);

        // a pre-existing binding restricts the matches
        let mut base = Substitution::new();
        base.insert(params[0].clone(), ontology.constants.value_to_entity("r2").unwrap().clone());
        let bindings = matches_in_world(&lifted, &world, &base);
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].get(&params[1]).unwrap().value.canonical_str(), "bedroom");
    }

    #[test]
    fn condition_bindings_honour_every_atom() {
        let (ontology, objects, world) = fixture();
        let params = pddl_to_parameters("(?r - robot ?l - location)", &ontology.types).unwrap();
        let condition = pddl_to_condition(
            "(and (at ?r ?l) (charged ?r))",
            &ontology,
            &objects,
            &params,
        )
        .unwrap();

        let env = EvalEnv {
            world: &world,
            ontology: &ontology,
            objects: &objects,
        };
        let bindings = condition_bindings(&condition, env, &params, &Substitution::new());
        // only r2 is charged, and it is in the bedroom
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].get(&params[0]).unwrap().value.canonical_str(), "r2");
        assert_eq!(bindings[0].get(&params[1]).unwrap().value.canonical_str(), "bedroom");
    }

    #[test]
    fn establishment_index_is_broadened_over_subtypes() {
        let (ontology, objects, _world) = fixture();
        let params = pddl_to_parameters("(?r - robot)", &ontology.types).unwrap();
        let effect = pddl_to_effect("(charged ?r)", &ontology, &objects, &params).unwrap();

        let mut index = FactOptionalsToId::new();
        index.add_effect(&effect, "recharge", &ontology.types);

        let literal = FactOptional::positive(pddl_to_fact("(charged r1)", &ontology, &objects, &[]).unwrap());
        assert_eq!(index.find(&literal), vec!["recharge"]);
        assert!(index.find(&literal.inverted()).is_empty());
    }
}
