use std::collections::BTreeMap;
use std::fmt::{Debug, Display};
use std::time::Instant;

use crate::conditions::EvalEnv;
use crate::{Condition, Effect, FactOptional};

/// A condition the planner is asked to make true, with its scheduling
/// metadata.
#[derive(Clone)]
pub struct Goal {
    objective: Condition,
    /// Do not pop the goal from the stack once satisfied.
    is_persistent: bool,
    /// The planner only has to make measurable progress towards the
    /// objective, not to satisfy it in one go.
    one_step_towards: bool,
    /// When set, the goal is only active while this fact holds.
    condition_fact: Option<FactOptional>,
    /// Seconds the goal survives without being addressed. Negative keeps it
    /// forever, zero drops it as soon as it is skipped.
    max_inactive_seconds: i64,
    inactive_since: Option<Instant>,
    group_id: String,
}

impl Goal {
    pub fn new(objective: Condition) -> Goal {
        Goal {
            objective,
            is_persistent: false,
            one_step_towards: false,
            condition_fact: None,
            max_inactive_seconds: -1,
            inactive_since: None,
            group_id: String::new(),
        }
    }

    pub fn with_max_inactive_seconds(mut self, seconds: i64) -> Goal {
        self.max_inactive_seconds = seconds;
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Goal {
        self.group_id = group_id.into();
        self
    }

    pub fn persistent(mut self) -> Goal {
        self.is_persistent = true;
        self
    }

    pub fn one_step_towards(mut self) -> Goal {
        self.one_step_towards = true;
        self
    }

    pub fn activated_by(mut self, condition_fact: FactOptional) -> Goal {
        self.condition_fact = Some(condition_fact);
        self
    }

    pub fn objective(&self) -> &Condition {
        &self.objective
    }

    pub fn is_persistent(&self) -> bool {
        self.is_persistent
    }

    pub fn is_one_step_towards(&self) -> bool {
        self.one_step_towards
    }

    pub fn condition_fact(&self) -> Option<&FactOptional> {
        self.condition_fact.as_ref()
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn max_inactive_seconds(&self) -> i64 {
        self.max_inactive_seconds
    }

    pub fn inactive_since(&self) -> Option<Instant> {
        self.inactive_since
    }

    /// A goal guarded by an activation fact is inactive while the fact does
    /// not hold.
    pub fn is_active(&self, env: EvalEnv) -> bool {
        match &self.condition_fact {
            Some(condition_fact) => crate::matching::holds_in_world(condition_fact, env.world),
            None => true,
        }
    }

    pub fn is_satisfied(&self, env: EvalEnv) -> bool {
        self.objective.is_true(env, None)
    }

    pub fn notify_activity(&mut self) {
        self.inactive_since = None;
    }

    pub fn set_inactive_since_if_not_set(&mut self, now: Option<Instant>) {
        if self.inactive_since.is_none() {
            self.inactive_since = now;
        }
    }

    pub fn is_inactive_for_too_long(&self, now: Option<Instant>) -> bool {
        if self.max_inactive_seconds < 0 {
            return false;
        }
        if self.max_inactive_seconds == 0 {
            return true;
        }
        match (self.inactive_since, now) {
            (Some(since), Some(now)) => now.duration_since(since).as_secs() > self.max_inactive_seconds as u64,
            _ => false,
        }
    }

    pub fn to_pddl(&self) -> String {
        let mut res = self.objective.to_pddl();
        if let Some(condition_fact) = &self.condition_fact {
            res = format!("(imply {} {})", condition_fact.to_pddl(false), res);
        }
        if self.one_step_towards {
            res = format!("(oneStepTowards {res})");
        }
        if self.is_persistent {
            res = format!("(persist {res})");
        }
        res
    }
}

impl PartialEq for Goal {
    // activity timestamps do not take part in goal identity
    fn eq(&self, other: &Self) -> bool {
        self.to_pddl() == other.to_pddl()
            && self.max_inactive_seconds == other.max_inactive_seconds
            && self.group_id == other.group_id
    }
}
impl Eq for Goal {}

impl Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_pddl())
    }
}
impl Debug for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// Priority-bucketed goal queue. Higher priorities are served first; within a
/// priority, insertion order is preserved.
#[derive(Clone, Default, Debug)]
pub struct GoalStack {
    goals: BTreeMap<i32, Vec<Goal>>,
    /// Modification applied to the world between two consecutive goals while
    /// executing the stack.
    pub effect_between_goals: Option<Effect>,
    /// The goal the planner is currently pursuing, used to detect the switch
    /// to the next goal.
    current_goal: Option<Goal>,
}

impl GoalStack {
    pub const DEFAULT_PRIORITY: i32 = 10;

    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole stack with the given goals at one priority.
    pub fn set_goals(&mut self, goals: Vec<Goal>, priority: i32) {
        self.goals.clear();
        self.current_goal = None;
        self.add_goals(goals, priority);
    }

    pub fn add_goals(&mut self, goals: Vec<Goal>, priority: i32) {
        if goals.is_empty() {
            return;
        }
        self.goals.entry(priority).or_default().extend(goals);
    }

    pub fn add_goal(&mut self, goal: Goal, priority: i32) {
        self.goals.entry(priority).or_default().push(goal);
    }

    pub fn is_empty(&self) -> bool {
        self.goals.values().all(|goals| goals.is_empty())
    }

    /// Goals from the most important to the least important.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &Goal)> + '_ {
        self.goals
            .iter()
            .rev()
            .flat_map(|(priority, goals)| goals.iter().map(move |g| (*priority, g)))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (i32, &mut Goal)> + '_ {
        self.goals
            .iter_mut()
            .rev()
            .flat_map(|(priority, goals)| goals.iter_mut().map(move |g| (*priority, g)))
    }

    /// The most important goal that is active and not yet satisfied.
    pub fn first_pending_goal(&self, env: EvalEnv) -> Option<(i32, &Goal)> {
        self.iter()
            .find(|(_, goal)| goal.is_active(env) && (goal.is_one_step_towards() || !goal.is_satisfied(env)))
    }

    /// Drops satisfied non-persistent goals.
    pub fn remove_satisfied_goals(&mut self, env: EvalEnv) {
        for goals in self.goals.values_mut() {
            goals.retain(|goal| goal.is_persistent() || !goal.is_satisfied(env));
        }
        self.goals.retain(|_, goals| !goals.is_empty());
    }

    /// Records which goal was just addressed: the addressed goal becomes
    /// active again, every other goal starts (or keeps) its inactivity clock,
    /// and goals inactive for too long are dropped.
    pub fn notify_goal_addressed(&mut self, addressed: Option<&Goal>, now: Option<Instant>) {
        for (_, goal) in self.iter_mut() {
            if addressed.is_some_and(|a| a == goal) {
                goal.notify_activity();
            } else {
                goal.set_inactive_since_if_not_set(now);
            }
        }
        self.remove_expired_goals(addressed, now);
    }

    fn remove_expired_goals(&mut self, addressed: Option<&Goal>, now: Option<Instant>) {
        for goals in self.goals.values_mut() {
            goals.retain(|goal| addressed.is_some_and(|a| a == goal) || !goal.is_inactive_for_too_long(now));
        }
        self.goals.retain(|_, goals| !goals.is_empty());
    }

    pub fn current_goal(&self) -> Option<&Goal> {
        self.current_goal.as_ref()
    }

    /// Records the goal the planner starts pursuing.
    pub fn note_current_goal(&mut self, goal: Option<Goal>) {
        self.current_goal = goal;
    }

    /// Drops the first goal equal to the given one. Returns true when a goal
    /// was removed.
    pub fn remove_goal(&mut self, goal: &Goal) -> bool {
        let found = self.goals.iter().find_map(|(priority, goals)| {
            goals.iter().position(|g| g == goal).map(|index| (*priority, index))
        });
        let Some((priority, index)) = found else {
            return false;
        };
        if let Some(goals) = self.goals.get_mut(&priority) {
            goals.remove(index);
            if goals.is_empty() {
                self.goals.remove(&priority);
            }
        }
        true
    }

    /// Drops every goal belonging to the given group. Returns true when at
    /// least one goal was removed.
    pub fn remove_goals_of_group(&mut self, group_id: &str) -> bool {
        let mut removed = false;
        for goals in self.goals.values_mut() {
            let before = goals.len();
            goals.retain(|goal| goal.group_id() != group_id);
            removed |= goals.len() != before;
        }
        self.goals.retain(|_, goals| !goals.is_empty());
        removed
    }
}

impl Display for GoalStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (priority, goal) in self.iter() {
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "[{priority}] {goal}")?;
            if !goal.group_id().is_empty() {
                write!(f, " groupId: {}", goal.group_id())?;
            }
        }
        Ok(())
    }
}
