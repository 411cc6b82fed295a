use std::fmt::{Debug, Display};

use itertools::Itertools;

use ogp_planning::{ActionId, Domain, Goal, Substitution};

/// A ground application of an action: the action identifier together with
/// the value chosen for each of its parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct ActionInvocation {
    pub action_id: ActionId,
    pub parameters: Substitution,
}

impl ActionInvocation {
    pub fn new(action_id: impl Into<ActionId>, parameters: Substitution) -> Self {
        Self {
            action_id: action_id.into(),
            parameters,
        }
    }

    /// Arguments in the declared parameter order of the action.
    pub fn ordered_arguments(&self, domain: &Domain) -> Vec<String> {
        match domain.action(&self.action_id) {
            Some(action) => action
                .parameters
                .iter()
                .filter_map(|p| self.parameters.get(p))
                .map(|e| e.value.canonical_string())
                .collect(),
            None => self.parameters.values().map(|e| e.value.canonical_string()).collect(),
        }
    }

    pub fn to_pddl(&self, domain: &Domain) -> String {
        let arguments = self.ordered_arguments(domain);
        if arguments.is_empty() {
            format!("({})", self.action_id)
        } else {
            format!("({} {})", self.action_id, arguments.join(" "))
        }
    }
}

impl Display for ActionInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.action_id)?;
        if !self.parameters.is_empty() {
            write!(
                f,
                "({})",
                self.parameters.iter().map(|(p, e)| format!("{p} -> {e}")).join(", ")
            )?;
        }
        Ok(())
    }
}
impl Debug for ActionInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// A step of a plan: the invocation plus the goal it was planned for.
#[derive(Clone, Debug)]
pub struct ActionInvocationWithGoal {
    pub action_invocation: ActionInvocation,
    pub from_goal: Option<Goal>,
    pub goal_priority: i32,
}

impl ActionInvocationWithGoal {
    pub fn new(action_invocation: ActionInvocation, from_goal: Option<Goal>, goal_priority: i32) -> Self {
        Self {
            action_invocation,
            from_goal,
            goal_priority,
        }
    }
}

impl Display for ActionInvocationWithGoal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.action_invocation)
    }
}

/// Renders a plan as a sequence of `(action arg1 arg2 ...)` lines.
pub fn plan_to_pddl(plan: &[ActionInvocationWithGoal], domain: &Domain) -> String {
    plan.iter()
        .map(|step| step.action_invocation.to_pddl(domain))
        .join("\n")
}

/// Renders a plan as written to an output file, with its header comments.
pub fn plan_to_pddl_file_content(plan: &[ActionInvocationWithGoal], domain: &Domain, problem_file_name: &str) -> String {
    format!(
        "; Plan generated by ogp.\n; Problem file: {}\n\n{}\n",
        problem_file_name,
        plan_to_pddl(plan, domain)
    )
}
