use std::time::Instant;

use ogp_planners::{SearchParameters, look_for_an_action_to_do_then_notify};
use ogp_planning::{Domain, Problem, SetOfCallbacks};

/// Plans for the most important goal, executes the first action of the plan
/// through the notification hooks and returns its rendering, or an empty
/// string when nothing can be done.
pub fn executed_action(
    problem: &mut Problem,
    domain: &Domain,
    callbacks: &SetOfCallbacks,
    now: Option<Instant>,
) -> String {
    let parameters = SearchParameters::default();
    look_for_an_action_to_do_then_notify(problem, domain, callbacks, &parameters, now)
        .map(|step| step.action_invocation.to_string())
        .unwrap_or_default()
}
