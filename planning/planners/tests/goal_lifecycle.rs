mod common;

use std::collections::BTreeMap;

use common::executed_action;
use ogp_planning::pddl::{pddl_to_effect, pddl_to_fact, pddl_to_goal};
use ogp_planning::{
    Action, Domain, EvalEnv, GoalStack, Ontology, Problem, SetOfCallbacks, SetOfPredicates, SetOfTypes,
};

fn three_facts_domain() -> Domain {
    let mut ontology = Ontology::default();
    ontology.types = SetOfTypes::new();
    ontology.predicates = SetOfPredicates::from_str("fact_a\nfact_b\nfact_c\nfact_guard", &ontology.types).unwrap();

    let no_objects = ogp_planning::SetOfEntities::new();
    let mut actions = BTreeMap::new();
    for name in ["a", "b", "c"] {
        actions.insert(
            format!("action_{name}"),
            Action::new(
                None,
                Some(pddl_to_effect(&format!("(fact_{name})"), &ontology, &no_objects, &[]).unwrap()),
            ),
        );
    }
    Domain::new(actions, ontology)
}

#[test]
fn one_step_towards_makes_strict_progress() {
    let domain = three_facts_domain();
    let callbacks = SetOfCallbacks::default();

    let mut problem = Problem::new();
    let goal = pddl_to_goal(
        "(oneStepTowards (and (fact_a) (fact_b) (fact_c)))",
        domain.ontology(),
        &problem.objects,
        -1,
        "",
    )
    .unwrap();
    assert!(goal.is_one_step_towards());
    problem.goal_stack.set_goals(vec![goal], GoalStack::DEFAULT_PRIORITY);

    // each invocation satisfies exactly one more atom of the objective
    assert_eq!("action_a", executed_action(&mut problem, &domain, &callbacks, None));
    assert_eq!("action_b", executed_action(&mut problem, &domain, &callbacks, None));
    assert_eq!("action_c", executed_action(&mut problem, &domain, &callbacks, None));
    assert_eq!("", executed_action(&mut problem, &domain, &callbacks, None));
    assert!(problem.goal_stack.is_empty());
}

#[test]
fn goal_with_no_patience_expires_when_skipped() {
    let domain = three_facts_domain();
    let callbacks = SetOfCallbacks::default();

    let mut problem = Problem::new();
    problem.goal_stack.add_goals(
        vec![pddl_to_goal("(fact_a)", domain.ontology(), &problem.objects, -1, "").unwrap()],
        GoalStack::DEFAULT_PRIORITY,
    );
    // less important, and dropped as soon as a plan does not address it
    problem.goal_stack.add_goals(
        vec![pddl_to_goal("(fact_b)", domain.ontology(), &problem.objects, 0, "").unwrap()],
        GoalStack::DEFAULT_PRIORITY - 1,
    );

    assert_eq!("action_a", executed_action(&mut problem, &domain, &callbacks, None));
    assert!(problem.goal_stack.is_empty());
}

#[test]
fn guarded_goal_is_inactive_until_its_fact_holds() {
    let domain = three_facts_domain();
    let callbacks = SetOfCallbacks::default();

    let mut problem = Problem::new();
    let goal = pddl_to_goal(
        "(imply (fact_guard) (fact_a))",
        domain.ontology(),
        &problem.objects,
        -1,
        "",
    )
    .unwrap();
    problem.goal_stack.set_goals(vec![goal], GoalStack::DEFAULT_PRIORITY);

    // the guard does not hold: nothing to do
    assert_eq!("", executed_action(&mut problem, &domain, &callbacks, None));

    let guard = pddl_to_fact("(fact_guard)", domain.ontology(), &problem.objects, &[]).unwrap();
    problem.world_state.add_fact(
        guard,
        domain.set_of_events(),
        &callbacks,
        domain.ontology(),
        &problem.objects,
    );
    assert_eq!("action_a", executed_action(&mut problem, &domain, &callbacks, None));
}

#[test]
fn persistent_goals_survive_their_satisfaction() {
    let domain = three_facts_domain();
    let callbacks = SetOfCallbacks::default();

    let mut problem = Problem::new();
    let goal = pddl_to_goal("(persist (fact_a))", domain.ontology(), &problem.objects, -1, "").unwrap();
    assert!(goal.is_persistent());
    problem.goal_stack.set_goals(vec![goal], GoalStack::DEFAULT_PRIORITY);

    assert_eq!("action_a", executed_action(&mut problem, &domain, &callbacks, None));
    // satisfied but still on the stack
    assert!(!problem.goal_stack.is_empty());
    assert_eq!("", executed_action(&mut problem, &domain, &callbacks, None));

    // the fact is lost: the goal becomes pending again
    let fact_a = pddl_to_fact("(fact_a)", domain.ontology(), &problem.objects, &[]).unwrap();
    problem.world_state.remove_fact(
        fact_a,
        domain.set_of_events(),
        &callbacks,
        domain.ontology(),
        &problem.objects,
    );
    assert_eq!("action_a", executed_action(&mut problem, &domain, &callbacks, None));
}

#[test]
fn goal_groups_can_be_dropped_at_once() {
    let domain = three_facts_domain();

    let mut problem = Problem::new();
    problem.goal_stack.set_goals(
        vec![
            pddl_to_goal("(fact_a)", domain.ontology(), &problem.objects, -1, "group1").unwrap(),
            pddl_to_goal("(fact_b)", domain.ontology(), &problem.objects, -1, "group1").unwrap(),
            pddl_to_goal("(fact_c)", domain.ontology(), &problem.objects, -1, "group2").unwrap(),
        ],
        GoalStack::DEFAULT_PRIORITY,
    );

    assert!(problem.goal_stack.remove_goals_of_group("group1"));
    assert!(!problem.goal_stack.remove_goals_of_group("group1"));

    let env = EvalEnv {
        world: &problem.world_state,
        ontology: domain.ontology(),
        objects: &problem.objects,
    };
    let remaining: Vec<String> = problem.goal_stack.iter().map(|(_, g)| g.to_pddl()).collect();
    assert_eq!(remaining, vec!["(fact_c)"]);
    assert!(problem.goal_stack.first_pending_goal(env).is_some());
}
