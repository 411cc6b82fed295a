mod common;

use std::collections::BTreeMap;

use common::executed_action;
use ogp_planning::pddl::{pddl_to_condition, pddl_to_effect, pddl_to_fact, pddl_to_goal, pddl_to_parameters};
use ogp_planning::{
    Action, Domain, GoalStack, Ontology, Problem, SetOfCallbacks, SetOfEntities, SetOfPredicates, SetOfTypes,
};

#[test]
fn negative_preconditions() {
    let mut ontology = Ontology::default();
    ontology.types = SetOfTypes::from_pddl("ent").unwrap();
    ontology.constants = SetOfEntities::from_pddl("e1 e2 e3 - ent", &ontology.types).unwrap();
    ontology.predicates = SetOfPredicates::from_str("lock(?e - ent)\nfact_a", &ontology.types).unwrap();

    let no_objects = SetOfEntities::new();
    let action_parameters = pddl_to_parameters("(?e - ent)", &ontology.types).unwrap();

    let mut actions = BTreeMap::new();
    let action1 = Action::new(
        None,
        Some(pddl_to_effect("(not (lock ?e))", &ontology, &no_objects, &action_parameters).unwrap()),
    )
    .with_parameters(action_parameters);
    actions.insert("action1".to_string(), action1);
    actions.insert(
        "action2".to_string(),
        Action::new(
            Some(pddl_to_condition("(not (lock e2))", &ontology, &no_objects, &[]).unwrap()),
            Some(pddl_to_effect("(fact_a)", &ontology, &no_objects, &[]).unwrap()),
        ),
    );

    let domain = Domain::new(actions, ontology);
    let callbacks = SetOfCallbacks::default();

    let mut problem = Problem::new();
    let lock_e2 = pddl_to_fact("(lock e2)", domain.ontology(), &problem.objects, &[]).unwrap();
    problem.world_state.add_fact(
        lock_e2,
        domain.set_of_events(),
        &callbacks,
        domain.ontology(),
        &problem.objects,
    );
    let goal = pddl_to_goal("(fact_a)", domain.ontology(), &problem.objects, -1, "").unwrap();
    problem.goal_stack.set_goals(vec![goal], GoalStack::DEFAULT_PRIORITY);

    assert_eq!("action1(?e -> e2)", executed_action(&mut problem, &domain, &callbacks, None));
    assert_eq!("action2", executed_action(&mut problem, &domain, &callbacks, None));
    assert_eq!("", executed_action(&mut problem, &domain, &callbacks, None));
}
