mod common;

use std::collections::BTreeMap;

use common::executed_action;
use ogp_planners::{SearchParameters, plan_for_every_goals, plan_to_pddl};
use ogp_planning::pddl::{pddl_to_condition, pddl_to_effect, pddl_to_goal};
use ogp_planning::{Action, Domain, GoalStack, Ontology, Problem, SetOfCallbacks, SetOfPredicates, SetOfTypes};

fn two_facts_domain() -> Domain {
    let mut ontology = Ontology::default();
    ontology.types = SetOfTypes::new();
    ontology.predicates = SetOfPredicates::from_str("fact_a\nfact_b", &ontology.types).unwrap();

    let no_objects = ogp_planning::SetOfEntities::new();
    let mut actions = BTreeMap::new();
    actions.insert(
        "action1".to_string(),
        Action::new(None, Some(pddl_to_effect("(fact_a)", &ontology, &no_objects, &[]).unwrap())),
    );
    actions.insert(
        "action2".to_string(),
        Action::new(
            Some(pddl_to_condition("(not (fact_a))", &ontology, &no_objects, &[]).unwrap()),
            Some(pddl_to_effect("(fact_b)", &ontology, &no_objects, &[]).unwrap()),
        ),
    );
    Domain::new(actions, ontology)
}

#[test]
fn effect_between_goals() {
    let domain = two_facts_domain();
    let callbacks = SetOfCallbacks::default();

    let mut problem = Problem::new();
    problem.goal_stack.set_goals(
        vec![
            pddl_to_goal("(fact_a)", domain.ontology(), &problem.objects, -1, "").unwrap(),
            pddl_to_goal("(fact_b)", domain.ontology(), &problem.objects, -1, "").unwrap(),
        ],
        GoalStack::DEFAULT_PRIORITY,
    );
    problem.goal_stack.effect_between_goals =
        Some(pddl_to_effect("(not (fact_a))", domain.ontology(), &problem.objects, &[]).unwrap());

    assert_eq!("action1", executed_action(&mut problem, &domain, &callbacks, None));
    assert_eq!("action2", executed_action(&mut problem, &domain, &callbacks, None));
    assert_eq!("", executed_action(&mut problem, &domain, &callbacks, None));
}

#[test]
fn higher_priority_goals_are_served_first() {
    let domain = two_facts_domain();
    let callbacks = SetOfCallbacks::default();
    let parameters = SearchParameters::default();

    // fact_b is more important than fact_a, and achievable first since
    // fact_a does not hold yet
    let mut problem = Problem::new();
    problem.goal_stack.add_goals(
        vec![pddl_to_goal("(fact_a)", domain.ontology(), &problem.objects, -1, "").unwrap()],
        GoalStack::DEFAULT_PRIORITY,
    );
    problem.goal_stack.add_goals(
        vec![pddl_to_goal("(fact_b)", domain.ontology(), &problem.objects, -1, "").unwrap()],
        GoalStack::DEFAULT_PRIORITY + 1,
    );

    let plan = plan_for_every_goals(&mut problem, &domain, &callbacks, &parameters, None);
    assert_eq!("(action2)\n(action1)", plan_to_pddl(&plan, &domain));

    // the goal a step was planned for never has a lower priority than the
    // goal of the following step
    for steps in plan.windows(2) {
        assert!(steps[0].goal_priority >= steps[1].goal_priority);
    }
    assert!(problem.goal_stack.is_empty());
}
