use std::collections::BTreeSet;
use std::time::Instant;

use tracing::{debug, trace};

use crate::plan::ActionInvocation;
use ogp_planning::{
    Action, Domain, Entity, EvalEnv, FactOptional, Goal, Param, SetOfCallbacks, SetOfEntities, Substitution,
    WorldState, condition_parameter_candidates, holds_in_world, unfold_map_with_set,
};

/// Bounds on the backward-chaining search. Exhausting any of them makes the
/// planner return "no plan", never an error.
#[derive(Clone, Debug)]
pub struct SearchParameters {
    /// Maximum depth of precondition sub-goaling.
    pub max_depth: usize,
    /// Maximum number of candidate ground actions examined per goal.
    pub max_steps: usize,
    /// Wall-clock deadline for the whole search.
    pub deadline: Option<Instant>,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            max_depth: 8,
            max_steps: 10_000,
            deadline: None,
        }
    }
}

pub(crate) struct SearchContext<'a> {
    pub domain: &'a Domain,
    pub objects: &'a SetOfEntities,
    pub parameters: &'a SearchParameters,
    steps: usize,
    no_callbacks: SetOfCallbacks,
}

impl<'a> SearchContext<'a> {
    pub fn new(domain: &'a Domain, objects: &'a SetOfEntities, parameters: &'a SearchParameters) -> Self {
        Self {
            domain,
            objects,
            parameters,
            steps: 0,
            no_callbacks: SetOfCallbacks::default(),
        }
    }

    fn env<'w>(&'w self, world: &'w WorldState) -> EvalEnv<'w> {
        EvalEnv {
            world,
            ontology: self.domain.ontology(),
            objects: self.objects,
        }
    }

    /// Counts one unit of work; false once a budget is exhausted.
    fn tick(&mut self) -> bool {
        self.steps += 1;
        if self.steps > self.parameters.max_steps {
            return false;
        }
        match self.parameters.deadline {
            Some(deadline) => Instant::now() < deadline,
            None => true,
        }
    }
}

/// Searches for a plan discharging the given goal from the given world.
/// The world is never mutated; the search works on copies.
pub(crate) fn plan_for_goal(world: &WorldState, goal: &Goal, ctx: &mut SearchContext) -> Option<Vec<ActionInvocation>> {
    let mut visited = BTreeSet::new();
    let max_depth = ctx.parameters.max_depth;
    if goal.is_one_step_towards() {
        // a single strict improvement of the objective is enough
        let unsatisfied = goal.objective().unsatisfied_facts(ctx.env(world), None);
        let before = unsatisfied.len();
        if before == 0 {
            return None;
        }
        for literal in &unsatisfied {
            let Some((plan, reached)) = achieve_literal(world, literal, &unsatisfied, ctx, max_depth, &mut visited)
            else {
                continue;
            };
            let after = goal.objective().unsatisfied_facts(ctx.env(&reached), None).len();
            if after < before {
                debug!(goal = %goal, steps = plan.len(), "one step towards goal");
                return Some(plan);
            }
        }
        return None;
    }
    achieve_condition(world.clone(), goal.objective(), ctx, max_depth, &mut visited).map(|(plan, _)| plan)
}

/// Plans until the condition holds, establishing one unsatisfied literal at a
/// time and simulating the world forward.
fn achieve_condition(
    world: WorldState,
    condition: &ogp_planning::Condition,
    ctx: &mut SearchContext,
    depth: usize,
    visited: &mut BTreeSet<(String, String)>,
) -> Option<(Vec<ActionInvocation>, WorldState)> {
    let mut world = world;
    let mut plan = Vec::new();
    loop {
        if condition.is_true(ctx.env(&world), None) {
            return Some((plan, world));
        }
        if !ctx.tick() {
            return None;
        }
        let literals = condition.unsatisfied_facts(ctx.env(&world), None);
        if literals.is_empty() {
            return None;
        }
        let key = (digest(&world), literals_key(&literals));
        if !visited.insert(key) {
            // already tried to reach this condition from this state
            return None;
        }
        let mut progressed = false;
        for literal in &literals {
            if let Some((subplan, reached)) = achieve_literal(&world, literal, &literals, ctx, depth, visited) {
                plan.extend(subplan);
                world = reached;
                progressed = true;
                break;
            }
        }
        if !progressed {
            return None;
        }
    }
}

/// Finds a ground action sequence whose last action establishes the literal.
fn achieve_literal(
    world: &WorldState,
    literal: &FactOptional,
    goal_literals: &[FactOptional],
    ctx: &mut SearchContext,
    depth: usize,
    visited: &mut BTreeSet<(String, String)>,
) -> Option<(Vec<ActionInvocation>, WorldState)> {
    if depth == 0 {
        return None;
    }
    trace!(literal = %literal, depth, "searching an establisher");

    // candidate actions able to establish the literal, best first:
    // most goal literals established, then cost, then action id
    let domain = ctx.domain;
    let mut candidates: Vec<(&String, &Action, usize)> = domain
        .effect_to_action_ids()
        .find(literal)
        .into_iter()
        .filter_map(|action_id| domain.action(action_id).map(|action| (action_id, action)))
        .map(|(action_id, action)| {
            let established = goal_literals
                .iter()
                .filter(|goal_literal| !effect_unifications(action, goal_literal).is_empty())
                .count();
            (action_id, action, established)
        })
        .collect();
    candidates.sort_by(|(id_a, action_a, established_a), (id_b, action_b, established_b)| {
        established_b
            .cmp(established_a)
            .then_with(|| action_a.cost.cmp(&action_b.cost))
            .then_with(|| id_a.cmp(id_b))
    });

    for (action_id, action, _) in candidates {
        if !ctx.tick() {
            return None;
        }
        for partial in effect_unifications(action, literal) {
            for binding in complete_bindings(&action.parameters, action.precondition.as_ref(), &partial, world, ctx) {
                let precondition_holds = action
                    .precondition
                    .as_ref()
                    .map_or(true, |pre| pre.is_true(ctx.env(world), Some(&binding)));
                if precondition_holds {
                    let reached = apply_action(world, action, &binding, ctx);
                    if holds_in_world(literal, &reached) {
                        let invocation = ActionInvocation::new(action_id.clone(), binding);
                        trace!(action = %invocation, "scheduling");
                        return Some((vec![invocation], reached));
                    }
                } else if depth > 1 {
                    // sub-goal: make the precondition true first
                    let Some(precondition) = &action.precondition else { continue };
                    let grounded = precondition.replace_parameters(&binding);
                    let Some((mut subplan, mid_world)) =
                        achieve_condition(world.clone(), &grounded, ctx, depth - 1, visited)
                    else {
                        continue;
                    };
                    let reached = apply_action(&mid_world, action, &binding, ctx);
                    if holds_in_world(literal, &reached) {
                        let invocation = ActionInvocation::new(action_id.clone(), binding);
                        trace!(action = %invocation, sub_steps = subplan.len(), "scheduling after sub-plan");
                        subplan.push(invocation);
                        return Some((subplan, reached));
                    }
                }
            }
        }
    }

    // an event can also establish the literal: planning for its precondition
    // makes it fire on its own
    achieve_literal_through_events(world, literal, ctx, depth, visited)
}

/// Tries to establish the literal by reaching the precondition of an event
/// whose effect produces it.
fn achieve_literal_through_events(
    world: &WorldState,
    literal: &FactOptional,
    ctx: &mut SearchContext,
    depth: usize,
    visited: &mut BTreeSet<(String, String)>,
) -> Option<(Vec<ActionInvocation>, WorldState)> {
    if depth <= 1 {
        return None;
    }
    let domain = ctx.domain;
    for set_of_events in domain.set_of_events().values() {
        for event_id in set_of_events.effect_to_event_ids().find(literal) {
            let Some(event) = set_of_events.events().get(event_id) else { continue };
            if !ctx.tick() {
                return None;
            }
            for partial in unifications_with_literal(&[Some(&event.effect)], literal) {
                for binding in complete_bindings(&event.parameters, Some(&event.precondition), &partial, world, ctx) {
                    let grounded = event.precondition.replace_parameters(&binding);
                    if grounded.is_true(ctx.env(world), None) {
                        // the event already fired; it cannot establish more
                        continue;
                    }
                    let Some((plan, reached)) = achieve_condition(world.clone(), &grounded, ctx, depth - 1, visited)
                    else {
                        continue;
                    };
                    if holds_in_world(literal, &reached) {
                        trace!(event = %event_id, "literal established through an event");
                        return Some((plan, reached));
                    }
                }
            }
        }
    }
    None
}

/// Bindings of the action parameters under which one of its effect atoms
/// matches the literal to establish.
fn effect_unifications(action: &Action, literal: &FactOptional) -> Vec<Substitution> {
    unifications_with_literal(&[action.at_start_effect.as_ref(), action.effect.as_ref()], literal)
}

fn unifications_with_literal(
    effects: &[Option<&ogp_planning::Effect>],
    literal: &FactOptional,
) -> Vec<Substitution> {
    let mut result: BTreeSet<Substitution> = BTreeSet::new();
    for effect in effects.iter().copied().flatten() {
        effect.for_each_fact(&mut |effect_atom, _ignore_value| {
            if effect_atom.is_negated != literal.is_negated {
                return;
            }
            if let Some(binding) = unify_effect_atom(&effect_atom.fact, &literal.fact) {
                result.insert(binding);
            }
        });
    }
    result.into_iter().collect()
}

/// Unifies a (lifted) effect atom with a literal that may itself still carry
/// variables. Variable slots of the literal impose no constraint.
fn unify_effect_atom(effect_fact: &ogp_planning::Fact, literal_fact: &ogp_planning::Fact) -> Option<Substitution> {
    if effect_fact.name() != literal_fact.name()
        || effect_fact.arguments().len() != literal_fact.arguments().len()
    {
        return None;
    }
    let mut binding = Substitution::new();

    let mut unify_slot = |effect_arg: &Entity, literal_arg: &Entity, binding: &mut Substitution| -> bool {
        if literal_arg.is_a_param_to_fill() || effect_arg.is_any() {
            return true;
        }
        if effect_arg.is_param() {
            let param = Param::new(effect_arg.value.clone(), effect_arg.tpe.clone());
            if let Some(bound) = binding.get(&param) {
                return bound.value == literal_arg.value;
            }
            if let (Some(expected), Some(actual)) = (&effect_arg.tpe, &literal_arg.tpe) {
                if !actual.is_a(expected) {
                    return false;
                }
            }
            binding.insert(param, literal_arg.clone());
            return true;
        }
        effect_arg.value == literal_arg.value
    };

    for (effect_arg, literal_arg) in effect_fact.arguments().iter().zip(literal_fact.arguments().iter()) {
        if !unify_slot(effect_arg, literal_arg, &mut binding) {
            return None;
        }
    }
    match (effect_fact.value(), literal_fact.value()) {
        (None, None) => {}
        (Some(effect_value), Some(literal_value)) => {
            if !unify_slot(effect_value, literal_value, &mut binding) {
                return None;
            }
        }
        // a delete effect (no value) can retract any value of a fluent
        (None, Some(_)) if literal_fact.predicate().is_fluent() => {}
        _ => return None,
    }
    Some(binding)
}

/// Completes a partial binding into ground bindings of every parameter,
/// guided by unifying the precondition against the world and falling back to
/// the typed domains of the remaining parameters.
fn complete_bindings(
    parameters: &[Param],
    precondition: Option<&ogp_planning::Condition>,
    partial: &Substitution,
    world: &WorldState,
    ctx: &SearchContext,
) -> Vec<Substitution> {
    let free: Vec<&Param> = parameters.iter().filter(|p| !partial.contains_key(*p)).collect();
    if free.is_empty() {
        return vec![partial.clone()];
    }

    let env = ctx.env(world);
    let mut candidates = match precondition {
        Some(precondition) => condition_parameter_candidates(precondition, env, parameters, partial),
        None => Default::default(),
    };
    for param in &free {
        let slot = candidates.entry((*param).clone()).or_default();
        if slot.is_empty() {
            let mut domain = ctx.domain.ontology().constants.entities_of_type(param.tpe());
            for entity in ctx.objects.entities_of_type(param.tpe()) {
                if !domain.iter().any(|e| e.value == entity.value) {
                    domain.push(entity);
                }
            }
            for entity in domain {
                slot.entry(entity.clone()).or_default();
            }
        }
    }
    // drop candidate slots of parameters already bound
    candidates.retain(|param, _| free.iter().any(|p| *p == param));

    unfold_map_with_set(&candidates)
        .into_iter()
        .map(|assignment| {
            let mut binding = partial.clone();
            binding.extend(assignment);
            binding
        })
        .collect()
}

/// Simulates the action on a copy of the world, with event propagation but
/// without observers.
fn apply_action(world: &WorldState, action: &Action, binding: &Substitution, ctx: &SearchContext) -> WorldState {
    let mut reached = world.clone();
    let at_start = action.at_start_effect.as_ref().map(|e| e.replace_parameters(binding));
    let main = action.effect.as_ref().map(|e| e.replace_parameters(binding));
    reached.apply_all(
        &[at_start.as_ref(), main.as_ref()],
        ctx.domain.set_of_events(),
        &ctx.no_callbacks,
        ctx.domain.ontology(),
        ctx.objects,
    );
    reached
}

fn digest(world: &WorldState) -> String {
    world
        .facts()
        .facts()
        .keys()
        .map(|fact| fact.to_string())
        .collect::<Vec<_>>()
        .join("|")
}

fn literals_key(literals: &[FactOptional]) -> String {
    literals.iter().map(|l| l.to_string()).collect::<Vec<_>>().join("|")
}
