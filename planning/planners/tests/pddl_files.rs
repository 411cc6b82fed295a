use std::path::Path;

use ogp_planners::{SearchParameters, plan_for_every_goals, plan_to_pddl, plan_to_pddl_file_content};
use ogp_planning::pddl::{find_domain_of, input::Input, pddl_to_domain, pddl_to_problem};
use ogp_planning::{Domain, EvalEnv, Problem, SetOfCallbacks};

fn load(domain_file: &str, problem_file: &str) -> (Domain, Problem) {
    let domain = pddl_to_domain(Input::from_file(Path::new(domain_file)).unwrap()).unwrap();
    let problem = pddl_to_problem(Input::from_file(Path::new(problem_file)).unwrap(), &domain).unwrap();
    (domain, problem)
}

#[test]
fn locks_problem_is_solved() {
    let (domain, mut problem) = load(
        "../problems/pddl/tests/locks.dom.pddl",
        "../problems/pddl/tests/locks.pb.pddl",
    );
    let callbacks = SetOfCallbacks::default();
    let parameters = SearchParameters::default();

    let plan = plan_for_every_goals(&mut problem, &domain, &callbacks, &parameters, None);
    assert_eq!("(unlock e2)\n(finish)", plan_to_pddl(&plan, &domain));
    assert!(problem.goal_stack.is_empty());

    let content = plan_to_pddl_file_content(&plan, &domain, "locks.pb.pddl");
    assert!(content.starts_with("; Plan generated by"));
    assert!(content.contains("; Problem file: locks.pb.pddl"));
}

#[test]
fn planning_is_deterministic() {
    let mut rendered = Vec::new();
    for _ in 0..2 {
        let (domain, mut problem) = load(
            "../problems/pddl/tests/locks.dom.pddl",
            "../problems/pddl/tests/locks.pb.pddl",
        );
        let callbacks = SetOfCallbacks::default();
        let parameters = SearchParameters::default();
        let plan = plan_for_every_goals(&mut problem, &domain, &callbacks, &parameters, None);
        rendered.push(plan_to_pddl(&plan, &domain));
    }
    assert_eq!(rendered[0], rendered[1]);
}

#[test]
fn executing_the_plan_reaches_the_goal() {
    let (domain, problem) = load(
        "../problems/pddl/tests/locks.dom.pddl",
        "../problems/pddl/tests/locks.pb.pddl",
    );
    let goals: Vec<_> = problem.goal_stack.iter().map(|(_, g)| g.clone()).collect();

    // plan on a scratch copy, then replay the plan on the pristine problem
    let mut scratch = problem.clone();
    let callbacks = SetOfCallbacks::default();
    let parameters = SearchParameters::default();
    let plan = plan_for_every_goals(&mut scratch, &domain, &callbacks, &parameters, None);
    assert!(!plan.is_empty());

    let mut replayed = problem;
    for step in &plan {
        ogp_planners::notify_action_started(&mut replayed, &domain, &callbacks, step, None);
        ogp_planners::notify_action_done(&mut replayed, &domain, &callbacks, step, None);
    }
    let env = EvalEnv {
        world: &replayed.world_state,
        ontology: domain.ontology(),
        objects: &replayed.objects,
    };
    for goal in goals {
        assert!(goal.is_satisfied(env), "goal {goal} is not satisfied after the plan");
    }
}

#[test]
fn counters_problem_uses_the_alarm_event() {
    let (domain, mut problem) = load(
        "../problems/pddl/tests/counters.dom.pddl",
        "../problems/pddl/tests/counters.pb.pddl",
    );
    let callbacks = SetOfCallbacks::default();
    let parameters = SearchParameters::default();

    let plan = plan_for_every_goals(&mut problem, &domain, &callbacks, &parameters, None);
    assert_eq!("(bump)\n(bump)\n(bump)\n(acknowledge)", plan_to_pddl(&plan, &domain));
    assert!(problem.goal_stack.is_empty());
}

#[test]
fn domain_file_is_found_next_to_the_problem() {
    let domain = find_domain_of(Path::new("../problems/pddl/tests/locks.pb.pddl")).unwrap();
    assert!(domain.ends_with("locks.dom.pddl"));
}
