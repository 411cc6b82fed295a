//! Serialization of domains and problems back to PDDL text.

use crate::{Domain, GoalStack, Problem};

fn section(out: &mut String, content: &str) {
    if !content.is_empty() {
        out.push_str(content);
        out.push('\n');
    }
}

pub fn domain_to_pddl(domain: &Domain) -> String {
    let ontology = domain.ontology();
    let mut out = String::new();
    out.push_str(&format!("(define (domain {})\n", domain.name()));

    if !domain.requirements().is_empty() {
        let requirements = domain.requirements().iter().cloned().collect::<Vec<_>>().join(" ");
        section(&mut out, &format!("    (:requirements {requirements})"));
    }

    let types = ontology.types.to_pddl();
    if !types.is_empty() {
        section(&mut out, &format!("    (:types\n{}\n    )", indent(&types, 8)));
    }

    let constants = ontology.constants.to_pddl();
    if !constants.is_empty() {
        section(&mut out, &format!("    (:constants\n{}\n    )", indent(&constants, 8)));
    }

    let mut predicates = Vec::new();
    let mut functions = Vec::new();
    let mut declarations: Vec<_> = ontology.predicates.iter().collect();
    declarations.sort_by(|a, b| a.name.cmp(&b.name));
    for predicate in declarations {
        match &predicate.value_type {
            None => predicates.push(format!("        {}", predicate.to_pddl())),
            Some(value_type) => functions.push(format!("        {} - {}", predicate.to_pddl(), value_type)),
        }
    }
    if !predicates.is_empty() {
        section(&mut out, &format!("    (:predicates\n{}\n    )", predicates.join("\n")));
    }
    if !functions.is_empty() {
        section(&mut out, &format!("    (:functions\n{}\n    )", functions.join("\n")));
    }

    let timeless = domain.timeless_facts().to_pddl(8, true);
    if !timeless.is_empty() {
        section(&mut out, &format!("    (:timeless\n{timeless}\n    )"));
    }

    let mut derived: Vec<_> = ontology.derived_predicates.values().collect();
    derived.sort_by(|a, b| a.predicate.name.cmp(&b.predicate.name));
    for derived in derived {
        let params = derived
            .predicate
            .parameters
            .iter()
            .map(|p| p.to_pddl())
            .collect::<Vec<_>>()
            .join(" ");
        let head = if params.is_empty() {
            format!("({})", derived.predicate.name)
        } else {
            format!("({} {})", derived.predicate.name, params)
        };
        section(
            &mut out,
            &format!("    (:derived {head}\n        {})", derived.condition.to_pddl()),
        );
    }

    for (action_id, action) in domain.actions() {
        let mut block = format!("    (:action {action_id}");
        let parameters = action
            .parameters
            .iter()
            .map(|p| p.to_pddl())
            .collect::<Vec<_>>()
            .join(" ");
        block.push_str(&format!("\n        :parameters ({parameters})"));
        if let Some(precondition) = &action.precondition {
            block.push_str(&format!("\n        :precondition {}", precondition.to_pddl()));
        }
        let mut effects = Vec::new();
        if let Some(at_start) = &action.at_start_effect {
            effects.push(format!("(at start {})", at_start.to_pddl()));
        }
        if let Some(effect) = &action.effect {
            effects.push(effect.to_pddl());
        }
        if !effects.is_empty() {
            block.push_str(&format!("\n        :effect {}", effects.join(" ")));
        }
        block.push_str(")\n");
        out.push_str(&block);
    }

    for set_of_events in domain.set_of_events().values() {
        for (event_id, event) in set_of_events.events() {
            let parameters = event.parameters.iter().map(|p| p.to_pddl()).collect::<Vec<_>>().join(" ");
            out.push_str(&format!(
                "    (:event {event_id}\n        :parameters ({parameters})\n        :precondition {}\n        :effect {})\n",
                event.precondition.to_pddl(),
                event.effect.to_pddl()
            ));
        }
    }

    out.push(')');
    out
}

pub fn problem_to_pddl(problem: &Problem, domain: &Domain) -> String {
    let mut out = String::new();
    out.push_str(&format!("(define (problem {})\n", problem.name));
    out.push_str(&format!("    (:domain {})\n", domain.name()));

    let objects = problem.objects.to_pddl();
    if !objects.is_empty() {
        out.push_str(&format!("    (:objects\n{}\n    )\n", indent(&objects, 8)));
    }

    let init = problem.world_state.facts().to_pddl(8, false);
    if !init.is_empty() {
        out.push_str(&format!("    (:init\n{init}\n    )\n"));
    }

    let goals: Vec<String> = problem
        .goal_stack
        .iter()
        .map(|(_, goal)| format!("        {}", goal.to_pddl()))
        .collect();
    match goals.len() {
        0 => {}
        1 => out.push_str(&format!("    (:goal\n{}\n    )\n", goals[0])),
        _ => out.push_str(&format!("    (:goal (and\n{}\n    ))\n", goals.join("\n"))),
    }

    out.push(')');
    out
}

pub fn goals_to_str(goal_stack: &GoalStack) -> String {
    goal_stack
        .iter()
        .map(|(_, goal)| goal.to_pddl())
        .collect::<Vec<_>>()
        .join(", ")
}

fn indent(content: &str, spaces: usize) -> String {
    let prefix = " ".repeat(spaces);
    content
        .lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GoalStack;
    use crate::pddl::convert::{pddl_to_domain, pddl_to_goal, pddl_to_problem};
    use crate::pddl::input::Input;

    fn fixture_domain() -> Domain {
        let source = "(define (domain storage)
            (:requirements :strips :typing :negative-preconditions :fluents :derived-predicates)
            (:types ent)
            (:constants e1 e2 - ent)
            (:predicates (lock ?e - ent) (fact_a))
            (:functions (usage ?e - ent) - number)
            (:timeless (lock e2))
            (:derived (free ?e - ent) (not (lock ?e)))
            (:action unlock
                :parameters (?e - ent)
                :precondition (not (fact_a))
                :effect (not (lock ?e)))
            (:action finish
                :parameters ()
                :effect (fact_a))
            (:event overuse
                :parameters (?e - ent)
                :precondition (> (usage ?e) 3)
                :effect (lock ?e)))";
        pddl_to_domain(Input::from_string(source)).unwrap()
    }

    #[test]
    fn every_domain_section_is_serialized() {
        let printed = domain_to_pddl(&fixture_domain());

        assert!(printed.starts_with("(define (domain storage)"));
        assert!(printed.contains("(:requirements"));
        assert!(printed.contains(":typing"));
        assert!(printed.contains("(:types"));
        assert!(printed.contains("(:constants"));
        assert!(printed.contains("(lock ?e - ent)"));
        assert!(printed.contains("(:functions"));
        assert!(printed.contains("(usage ?e - ent) - number"));
        assert!(printed.contains("(:timeless\n        (lock e2)"));
        assert!(printed.contains("(:derived (free ?e - ent)\n        (not (lock ?e))"));
        assert!(printed.contains("(:action unlock"));
        assert!(printed.contains(":precondition (not (fact_a))"));
        assert!(printed.contains("(:event overuse"));
        assert!(printed.contains(":precondition (> (usage ?e) 3)"));
    }

    #[test]
    fn printed_domain_keeps_derived_and_events_through_a_round_trip() {
        let domain = fixture_domain();
        let printed = domain_to_pddl(&domain);
        let reparsed = pddl_to_domain(Input::from_string(&printed)).unwrap();

        assert_eq!(reparsed.name(), domain.name());
        assert_eq!(reparsed.actions().len(), domain.actions().len());
        assert_eq!(
            reparsed.ontology().derived_predicates.len(),
            domain.ontology().derived_predicates.len()
        );
        assert_eq!(reparsed.timeless_facts().facts().len(), 1);
        let events: usize = reparsed.set_of_events().values().map(|s| s.events().len()).sum();
        assert_eq!(events, 1);
    }

    #[test]
    fn single_goal_problems_are_not_wrapped_in_a_conjunction() {
        let domain = fixture_domain();
        let source = "(define (problem storage-1)
            (:domain storage)
            (:objects e3 - ent)
            (:init (= (usage e1) 2))
            (:goal (fact_a)))";
        let problem = pddl_to_problem(Input::from_string(source), &domain).unwrap();

        let printed = problem_to_pddl(&problem, &domain);
        assert!(printed.starts_with("(define (problem storage-1)"));
        assert!(printed.contains("(:domain storage)"));
        assert!(printed.contains("(:objects\n        e3 - ent"));
        assert!(printed.contains("(= (usage e1) 2)"));
        // the timeless fact belongs to the domain, not to the init section
        assert!(!printed.contains("(lock e2)"));
        assert!(printed.contains("(:goal\n        (fact_a)\n    )"));
        assert!(!printed.contains("(:goal (and"));
    }

    #[test]
    fn goal_stacks_print_with_their_wrappers() {
        let domain = fixture_domain();
        let source = "(define (problem storage-2)
            (:domain storage)
            (:init)
            (:goal (and (fact_a) (persist (not (lock e1))))))";
        let problem = pddl_to_problem(Input::from_string(source), &domain).unwrap();

        let printed = problem_to_pddl(&problem, &domain);
        assert!(printed.contains("(:goal (and"));
        assert!(printed.contains("        (fact_a)"));
        assert!(printed.contains("        (persist (not (lock e1)))"));
    }

    #[test]
    fn goals_to_str_lists_the_most_important_first() {
        let domain = fixture_domain();
        let objects = crate::SetOfEntities::new();
        let mut goal_stack = GoalStack::new();
        goal_stack.add_goals(
            vec![pddl_to_goal("(not (lock e1))", domain.ontology(), &objects, -1, "").unwrap()],
            GoalStack::DEFAULT_PRIORITY,
        );
        goal_stack.add_goals(
            vec![pddl_to_goal("(fact_a)", domain.ontology(), &objects, -1, "").unwrap()],
            GoalStack::DEFAULT_PRIORITY + 1,
        );

        assert_eq!(goals_to_str(&goal_stack), "(fact_a), (not (lock e1))");
    }
}
