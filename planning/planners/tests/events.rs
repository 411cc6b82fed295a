mod common;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use common::executed_action;
use ogp_planning::pddl::{pddl_to_condition, pddl_to_effect, pddl_to_fact, pddl_to_goal};
use ogp_planning::{
    Action, ConditionToCallback, Domain, Event, GoalStack, MutableSetOfCallbacks, Ontology, Problem, SetOfCallbacks,
    SetOfEvents, SetOfPredicates, SetOfTypes,
};

fn chained_events_domain() -> Domain {
    let mut ontology = Ontology::default();
    ontology.types = SetOfTypes::new();
    ontology.predicates = SetOfPredicates::from_str("fact_x\nfact_y\nfact_z", &ontology.types).unwrap();

    let no_objects = ogp_planning::SetOfEntities::new();
    let mut actions = BTreeMap::new();
    actions.insert(
        "action1".to_string(),
        Action::new(None, Some(pddl_to_effect("(fact_x)", &ontology, &no_objects, &[]).unwrap())),
    );

    let mut events = SetOfEvents::new();
    events.add(
        Event::new(
            pddl_to_condition("(fact_x)", &ontology, &no_objects, &[]).unwrap(),
            pddl_to_effect("(fact_y)", &ontology, &no_objects, &[]).unwrap(),
        ),
        "event",
        &ontology.types,
    );
    events.add(
        Event::new(
            pddl_to_condition("(fact_y)", &ontology, &no_objects, &[]).unwrap(),
            pddl_to_effect("(fact_z)", &ontology, &no_objects, &[]).unwrap(),
        ),
        "event",
        &ontology.types,
    );

    Domain::new(actions, ontology).with_set_of_events(events)
}

#[test]
fn events_propagate_to_fixed_point() {
    let domain = chained_events_domain();
    let callbacks = SetOfCallbacks::default();

    let mut problem = Problem::new();
    problem.goal_stack.set_goals(
        vec![pddl_to_goal("(fact_x)", domain.ontology(), &problem.objects, -1, "").unwrap()],
        GoalStack::DEFAULT_PRIORITY,
    );

    assert_eq!("action1", executed_action(&mut problem, &domain, &callbacks, None));

    let ontology = domain.ontology();
    for fact in ["(fact_x)", "(fact_y)", "(fact_z)"] {
        let fact = pddl_to_fact(fact, ontology, &problem.objects, &[]).unwrap();
        assert!(problem.world_state.has_fact(&fact), "missing {fact}");
    }
}

#[test]
fn goal_satisfied_through_an_event_chain() {
    let domain = chained_events_domain();
    let callbacks = SetOfCallbacks::default();

    // fact_z is only establishable by the event chain behind action1
    let mut problem = Problem::new();
    problem.goal_stack.set_goals(
        vec![pddl_to_goal("(fact_z)", domain.ontology(), &problem.objects, -1, "").unwrap()],
        GoalStack::DEFAULT_PRIORITY,
    );

    assert_eq!("action1", executed_action(&mut problem, &domain, &callbacks, None));
    assert_eq!("", executed_action(&mut problem, &domain, &callbacks, None));
    assert!(problem.goal_stack.is_empty());
}

#[test]
fn callbacks_fire_once_the_world_is_quiescent() {
    let domain = chained_events_domain();

    let observed = Rc::new(RefCell::new(Vec::new()));
    let mut callbacks = MutableSetOfCallbacks::new();
    let no_objects = ogp_planning::SetOfEntities::new();
    let sink = observed.clone();
    callbacks.add(ConditionToCallback::new(
        pddl_to_condition("(fact_z)", domain.ontology(), &no_objects, &[]).unwrap(),
        move |_| sink.borrow_mut().push("fact_z holds"),
    ));
    let callbacks = callbacks.freeze(&domain.ontology().types);

    let mut problem = Problem::new();
    problem.goal_stack.set_goals(
        vec![pddl_to_goal("(fact_x)", domain.ontology(), &problem.objects, -1, "").unwrap()],
        GoalStack::DEFAULT_PRIORITY,
    );

    assert_eq!("action1", executed_action(&mut problem, &domain, &callbacks, None));
    // the observer saw the state reached after the whole event cascade
    assert_eq!(*observed.borrow(), vec!["fact_z holds"]);

    // a second, unrelated action does not re-notify
    assert_eq!("", executed_action(&mut problem, &domain, &callbacks, None));
    assert_eq!(observed.borrow().len(), 1);
}
