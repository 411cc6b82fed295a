
use crate::{Domain, GoalStack, SetOfEntities, Sym, WorldState};

/// What the planner plans for: the mutable world, the prioritized goals and
/// the objects of the instance at hand.
#[derive(Clone, Default, Debug)]
pub struct Problem {
    pub name: Sym,
    pub world_state: WorldState,
    pub goal_stack: GoalStack,
    pub objects: SetOfEntities,
}

impl Problem {
    pub fn new() -> Problem {
        Problem::default()
    }

    /// A fresh problem for the given domain, with its timeless facts already
    /// in the world state.
    pub fn for_domain(domain: &Domain) -> Problem {
        let mut problem = Problem::default();
        for (fact, _) in domain.timeless_facts().facts() {
            problem.world_state.add_timeless_fact(fact.clone(), domain.ontology());
        }
        problem
    }
}
