use std::fmt::{Debug, Display};

use crate::conditions::Substitution;
use crate::{Condition, Entity, Fact, FactOptional, Param, RealValue};

/// Right-hand side of a fluent update.
#[derive(Clone, Debug)]
pub enum FluentExpr {
    Number(RealValue),
    Entity(Entity),
    /// The current value of another fluent.
    Read(Fact),
}

impl FluentExpr {
    pub fn replace_parameters(&self, subst: &Substitution) -> FluentExpr {
        match self {
            FluentExpr::Number(n) => FluentExpr::Number(*n),
            FluentExpr::Entity(entity) => {
                let mut entity = entity.clone();
                if entity.is_param() {
                    if let Some(bound) = subst.get(&Param::new(entity.value.clone(), None)) {
                        entity = bound.clone();
                    }
                }
                FluentExpr::Entity(entity)
            }
            FluentExpr::Read(fact) => {
                let mut fact = fact.clone();
                fact.replace_arguments(subst);
                FluentExpr::Read(fact)
            }
        }
    }

    pub fn to_pddl(&self) -> String {
        match self {
            FluentExpr::Number(n) => {
                if n.is_integer() {
                    n.numer().to_string()
                } else {
                    format!("{}", (*n.numer() as f64) / (*n.denom() as f64))
                }
            }
            FluentExpr::Entity(entity) => entity.value.canonical_string(),
            FluentExpr::Read(fact) => {
                let args = fact
                    .arguments()
                    .iter()
                    .map(|a| a.value.canonical_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                if args.is_empty() {
                    format!("({})", fact.name())
                } else {
                    format!("({} {})", fact.name(), args)
                }
            }
        }
    }
}

/// A modification of the world state.
#[derive(Clone, Debug)]
pub enum Effect {
    /// Insert (or overwrite) a fact.
    Add(Fact),
    /// Remove a fact, whatever its fluent value.
    Delete(Fact),
    Assign(Fact, FluentExpr),
    Increase(Fact, FluentExpr),
    Decrease(Fact, FluentExpr),
    And(Vec<Effect>),
    /// Conditional effect; the condition is evaluated on the pre-step world.
    When(Condition, Box<Effect>),
    Forall(Param, Box<Effect>),
}

impl Effect {
    pub fn and(mut effects: Vec<Effect>) -> Effect {
        if effects.len() == 1 {
            effects.remove(0)
        } else {
            Effect::And(effects)
        }
    }

    pub fn replace_parameters(&self, subst: &Substitution) -> Effect {
        let on_fact = |fact: &Fact| {
            let mut fact = fact.clone();
            fact.replace_arguments(subst);
            fact
        };
        match self {
            Effect::Add(fact) => Effect::Add(on_fact(fact)),
            Effect::Delete(fact) => Effect::Delete(on_fact(fact)),
            Effect::Assign(fact, value) => Effect::Assign(on_fact(fact), value.replace_parameters(subst)),
            Effect::Increase(fact, value) => Effect::Increase(on_fact(fact), value.replace_parameters(subst)),
            Effect::Decrease(fact, value) => Effect::Decrease(on_fact(fact), value.replace_parameters(subst)),
            Effect::And(items) => Effect::And(items.iter().map(|e| e.replace_parameters(subst)).collect()),
            Effect::When(condition, body) => Effect::When(
                condition.replace_parameters(subst),
                Box::new(body.replace_parameters(subst)),
            ),
            Effect::Forall(param, body) => {
                let mut subst = subst.clone();
                subst.remove(param);
                Effect::Forall(param.clone(), Box::new(body.replace_parameters(&subst)))
            }
        }
    }

    /// Visits every fact this effect can establish (positive) or retract
    /// (negative), including the bodies of conditional effects.
    pub fn for_each_fact(&self, visit: &mut dyn FnMut(&FactOptional, bool /* ignore value */)) {
        match self {
            Effect::Add(fact) => {
                let negated = fact.value().is_some_and(|v| v.is_undefined());
                visit(&FactOptional::new(fact.clone(), negated), false)
            }
            Effect::Delete(fact) => visit(&FactOptional::negated(fact.clone()), true),
            Effect::Assign(fact, value) => {
                let mut fact = fact.clone();
                match value {
                    FluentExpr::Number(n) => {
                        fact.set_value(Some(Entity::from_number(*n)));
                        visit(&FactOptional::positive(fact), false)
                    }
                    FluentExpr::Entity(entity) if entity.is_undefined() => {
                        fact.set_value(Some(Entity::any()));
                        visit(&FactOptional::negated(fact), true)
                    }
                    FluentExpr::Entity(entity) => {
                        fact.set_value(Some(entity.clone()));
                        visit(&FactOptional::positive(fact), false)
                    }
                    FluentExpr::Read(_) => {
                        fact.set_value(Some(Entity::any()));
                        visit(&FactOptional::positive(fact), true)
                    }
                }
            }
            Effect::Increase(fact, _) | Effect::Decrease(fact, _) => {
                let mut fact = fact.clone();
                fact.set_value(Some(Entity::any()));
                visit(&FactOptional::positive(fact), true)
            }
            Effect::And(items) => {
                for item in items {
                    item.for_each_fact(visit);
                }
            }
            Effect::When(_, body) => body.for_each_fact(visit),
            Effect::Forall(_, body) => body.for_each_fact(visit),
        }
    }

    pub fn to_pddl(&self) -> String {
        match self {
            Effect::Add(fact) => fact.to_pddl(true),
            Effect::Delete(fact) => {
                if fact.predicate().is_fluent() {
                    let mut fact = fact.clone();
                    fact.set_value(Some(Entity::undefined()));
                    fact.to_pddl(true)
                } else {
                    format!("(not {})", fact.to_pddl(true))
                }
            }
            Effect::Assign(fact, value) => {
                format!("(assign {} {})", fluent_slot_pddl(fact), value.to_pddl())
            }
            Effect::Increase(fact, value) => {
                format!("(increase {} {})", fluent_slot_pddl(fact), value.to_pddl())
            }
            Effect::Decrease(fact, value) => {
                format!("(decrease {} {})", fluent_slot_pddl(fact), value.to_pddl())
            }
            Effect::And(items) => {
                format!("(and {})", items.iter().map(|e| e.to_pddl()).collect::<Vec<_>>().join(" "))
            }
            Effect::When(condition, body) => format!("(when {} {})", condition.to_pddl(), body.to_pddl()),
            Effect::Forall(param, body) => format!("(forall ({}) {})", param.to_pddl(), body.to_pddl()),
        }
    }
}

fn fluent_slot_pddl(fact: &Fact) -> String {
    let args = fact
        .arguments()
        .iter()
        .map(|a| a.value.canonical_str())
        .collect::<Vec<_>>()
        .join(" ");
    if args.is_empty() {
        format!("({})", fact.name())
    } else {
        format!("({} {})", fact.name(), args)
    }
}

impl Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_pddl())
    }
}
