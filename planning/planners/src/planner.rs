use std::time::Instant;

use tracing::debug;

use crate::plan::ActionInvocationWithGoal;
use crate::search::{SearchContext, SearchParameters, plan_for_goal};
use ogp_planning::{Domain, EvalEnv, Goal, Problem, SetOfCallbacks, SetOfEntities, WorldState};

fn eval_env<'a>(world: &'a WorldState, objects: &'a SetOfEntities, domain: &'a Domain) -> EvalEnv<'a> {
    EvalEnv {
        world,
        ontology: domain.ontology(),
        objects,
    }
}

/// Applies the stack's between-goals effect when the planner switches from
/// one goal to the next.
fn switch_to_goal(problem: &mut Problem, domain: &Domain, callbacks: &SetOfCallbacks, goal: &Goal) {
    let switching = problem
        .goal_stack
        .current_goal()
        .is_some_and(|previous| previous != goal);
    if switching {
        if let Some(effect) = problem.goal_stack.effect_between_goals.clone() {
            debug!("applying the between-goals effect");
            problem.world_state.modify(
                Some(&effect),
                domain.set_of_events(),
                callbacks,
                domain.ontology(),
                &problem.objects,
            );
        }
    }
    problem.goal_stack.note_current_goal(Some(goal.clone()));
}

/// Produces a plan for the most important goal that can still be planned for.
/// Goals are tried from the most important down; the first one for which the
/// search finds a non-empty plan wins. Returns an empty plan when no goal can
/// be advanced (including on search-budget exhaustion).
pub fn plan_for_more_important_goal_possible(
    problem: &mut Problem,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    parameters: &SearchParameters,
    _now: Option<Instant>,
) -> Vec<ActionInvocationWithGoal> {
    loop {
        let pending: Vec<(i32, Goal)> = {
            let env = eval_env(&problem.world_state, &problem.objects, domain);
            problem
                .goal_stack
                .iter()
                .filter(|(_, goal)| goal.is_active(env))
                .filter(|(_, goal)| goal.is_one_step_towards() || !goal.is_satisfied(env))
                .map(|(priority, goal)| (priority, goal.clone()))
                .collect()
        };
        let Some((_, most_important)) = pending.first() else {
            return Vec::new();
        };
        // moving on to another goal may rewrite the world, which in turn may
        // change which goals are pending; recompute when that happens
        let switching = problem
            .goal_stack
            .current_goal()
            .is_some_and(|previous| previous != most_important);
        switch_to_goal(problem, domain, callbacks, most_important);
        if switching && problem.goal_stack.effect_between_goals.is_some() {
            let env = eval_env(&problem.world_state, &problem.objects, domain);
            if !most_important.is_active(env)
                || (!most_important.is_one_step_towards() && most_important.is_satisfied(env))
            {
                continue;
            }
        }

        for (priority, goal) in pending {
            let mut ctx = SearchContext::new(domain, &problem.objects, parameters);
            let Some(plan) = plan_for_goal(&problem.world_state, &goal, &mut ctx) else {
                debug!(goal = %goal, "no plan for goal, trying a less important one");
                continue;
            };
            if plan.is_empty() {
                continue;
            }
            return plan
                .into_iter()
                .map(|invocation| ActionInvocationWithGoal::new(invocation, Some(goal.clone()), priority))
                .collect();
        }
        return Vec::new();
    }
}

/// Plans and executes goal after goal, most important first, until the stack
/// is exhausted or no goal can be advanced. The `effect_between_goals` of the
/// stack is applied to the world between two consecutive goals.
pub fn plan_for_every_goals(
    problem: &mut Problem,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    parameters: &SearchParameters,
    now: Option<Instant>,
) -> Vec<ActionInvocationWithGoal> {
    let mut result = Vec::new();
    loop {
        {
            let env = eval_env(&problem.world_state, &problem.objects, domain);
            problem.goal_stack.remove_satisfied_goals(env);
        }
        let plan = plan_for_more_important_goal_possible(problem, domain, callbacks, parameters, now);
        if plan.is_empty() {
            // the most important pending goal cannot be advanced: drop it so
            // the others get their chance
            let pending = {
                let env = eval_env(&problem.world_state, &problem.objects, domain);
                problem.goal_stack.first_pending_goal(env).map(|(_, goal)| goal.clone())
            };
            match pending {
                Some(goal) => {
                    debug!(goal = %goal, "dropping goal that cannot be advanced");
                    problem.goal_stack.remove_goal(&goal);
                    continue;
                }
                None => break,
            }
        }
        for step in plan {
            notify_action_started(problem, domain, callbacks, &step, now);
            notify_action_done(problem, domain, callbacks, &step, now);
            result.push(step);
        }
    }
    result
}

/// Records that the action started: applies its at-start effects.
pub fn notify_action_started(
    problem: &mut Problem,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    step: &ActionInvocationWithGoal,
    _now: Option<Instant>,
) {
    let invocation = &step.action_invocation;
    let Some(action) = domain.action(&invocation.action_id) else { return };
    let at_start = action
        .at_start_effect
        .as_ref()
        .map(|effect| effect.replace_parameters(&invocation.parameters));
    problem.world_state.modify(
        at_start.as_ref(),
        domain.set_of_events(),
        callbacks,
        domain.ontology(),
        &problem.objects,
    );
}

/// Records that the action completed: applies its remaining effects, then
/// advances the goal stack (satisfied goals pop, skipped goals age and may
/// expire).
pub fn notify_action_done(
    problem: &mut Problem,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    step: &ActionInvocationWithGoal,
    now: Option<Instant>,
) {
    let invocation = &step.action_invocation;
    if let Some(action) = domain.action(&invocation.action_id) {
        if let Some(over_all) = &action.over_all_condition {
            let env = eval_env(&problem.world_state, &problem.objects, domain);
            if !over_all.is_true(env, Some(&invocation.parameters)) {
                debug!(action = %invocation, "over-all condition does not hold anymore");
            }
        }
        let effect = action
            .effect
            .as_ref()
            .map(|effect| effect.replace_parameters(&invocation.parameters));
        problem.world_state.modify(
            effect.as_ref(),
            domain.set_of_events(),
            callbacks,
            domain.ontology(),
            &problem.objects,
        );
    }

    {
        let env = eval_env(&problem.world_state, &problem.objects, domain);
        problem.goal_stack.remove_satisfied_goals(env);
    }
    problem.goal_stack.notify_goal_addressed(step.from_goal.as_ref(), now);
}

/// Convenience used by interactive callers: plans for the most important
/// goal, then runs the first action of the plan through the two notification
/// hooks. Returns the executed invocation, if any.
pub fn look_for_an_action_to_do_then_notify(
    problem: &mut Problem,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    parameters: &SearchParameters,
    now: Option<Instant>,
) -> Option<ActionInvocationWithGoal> {
    let plan = plan_for_more_important_goal_possible(problem, domain, callbacks, parameters, now);
    let first = plan.into_iter().next()?;
    notify_action_started(problem, domain, callbacks, &first, now);
    notify_action_done(problem, domain, callbacks, &first, now);
    Some(first)
}
