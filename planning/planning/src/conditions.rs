use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

use crate::matching::holds_in_world;
use crate::{Entity, FactOptional, Ontology, Param, RealValue, SetOfEntities, WorldState};

/// Comparison operators over numeric fluents (and entity equality).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CompOp {
    Eq,
    Lt,
    Leq,
    Gt,
    Geq,
}

impl CompOp {
    pub fn pddl_str(self) -> &'static str {
        match self {
            CompOp::Eq => "=",
            CompOp::Lt => "<",
            CompOp::Leq => "<=",
            CompOp::Gt => ">",
            CompOp::Geq => ">=",
        }
    }
}

/// Read-only context needed to evaluate a condition.
#[derive(Copy, Clone)]
pub struct EvalEnv<'a> {
    pub world: &'a WorldState,
    pub ontology: &'a Ontology,
    pub objects: &'a SetOfEntities,
}

pub type Substitution = BTreeMap<Param, Entity>;

/// Context handed to the fact visitor of a condition.
#[derive(Clone, Copy, Default)]
pub struct FactVisit {
    /// The atom appears under an odd number of negations.
    pub negated_context: bool,
    /// The fluent value of the atom is irrelevant for indexing purposes
    /// (the atom is an operand of a comparison).
    pub ignore_value: bool,
}

/// Boolean expression over facts.
#[derive(Clone, Debug)]
pub enum Condition {
    Fact(FactOptional),
    Not(Box<Condition>),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Imply(Box<Condition>, Box<Condition>),
    Forall(Param, Box<Condition>),
    Exists(Param, Box<Condition>),
    /// Numeric constant, operand of comparisons.
    Number(RealValue),
    /// Entity term, operand of equality comparisons.
    Entity(Entity),
    Compare(CompOp, Box<Condition>, Box<Condition>),
}

/// Value of a comparison operand.
enum TermValue {
    Number(RealValue),
    Entity(Entity),
    Absent,
}

impl Condition {
    pub fn fact(fact: crate::Fact) -> Condition {
        Condition::Fact(FactOptional::positive(fact))
    }

    pub fn and(mut conjuncts: Vec<Condition>) -> Condition {
        if conjuncts.len() == 1 {
            conjuncts.remove(0)
        } else {
            Condition::And(conjuncts)
        }
    }

    /// Visits every fact atom of this condition together with its context.
    pub fn for_each_fact(&self, visit: &mut dyn FnMut(&FactOptional, FactVisit)) {
        self.visit_facts(visit, FactVisit::default())
    }

    fn visit_facts(&self, visit: &mut dyn FnMut(&FactOptional, FactVisit), ctx: FactVisit) {
        match self {
            Condition::Fact(optfact) => visit(optfact, ctx),
            Condition::Not(inner) => inner.visit_facts(
                visit,
                FactVisit {
                    negated_context: !ctx.negated_context,
                    ..ctx
                },
            ),
            Condition::And(items) | Condition::Or(items) => {
                for item in items {
                    item.visit_facts(visit, ctx);
                }
            }
            Condition::Imply(antecedent, consequent) => {
                // (imply a b) == (or (not a) b)
                antecedent.visit_facts(
                    visit,
                    FactVisit {
                        negated_context: !ctx.negated_context,
                        ..ctx
                    },
                );
                consequent.visit_facts(visit, ctx);
            }
            Condition::Forall(_, body) | Condition::Exists(_, body) => body.visit_facts(visit, ctx),
            Condition::Number(_) | Condition::Entity(_) => {}
            Condition::Compare(_, lhs, rhs) => {
                let ctx = FactVisit { ignore_value: true, ..ctx };
                lhs.visit_facts(visit, ctx);
                rhs.visit_facts(visit, ctx);
            }
        }
    }

    /// Evaluates the condition on the world. Atoms that still contain
    /// variables after applying `binding` are read existentially.
    pub fn is_true(&self, env: EvalEnv, binding: Option<&Substitution>) -> bool {
        match self {
            Condition::Fact(optfact) => {
                let optfact = substituted(optfact, binding);
                holds_in_world(&optfact, env.world)
            }
            Condition::Not(inner) => !inner.is_true(env, binding),
            Condition::And(items) => items.iter().all(|c| c.is_true(env, binding)),
            Condition::Or(items) => items.iter().any(|c| c.is_true(env, binding)),
            Condition::Imply(antecedent, consequent) => {
                !antecedent.is_true(env, binding) || consequent.is_true(env, binding)
            }
            Condition::Forall(param, body) => quantifier_domain(env, param)
                .into_iter()
                .all(|entity| body.is_true(env, Some(&extended(binding, param, entity)))),
            Condition::Exists(param, body) => quantifier_domain(env, param)
                .into_iter()
                .any(|entity| body.is_true(env, Some(&extended(binding, param, entity)))),
            Condition::Number(_) | Condition::Entity(_) => true,
            Condition::Compare(op, lhs, rhs) => {
                let lhs = lhs.eval_term(env, binding);
                let rhs = rhs.eval_term(env, binding);
                compare(*op, lhs, rhs)
            }
        }
    }

    fn eval_term(&self, env: EvalEnv, binding: Option<&Substitution>) -> TermValue {
        match self {
            Condition::Number(n) => TermValue::Number(*n),
            Condition::Entity(entity) => {
                let mut entity = entity.clone();
                if let (true, Some(binding)) = (entity.is_param(), binding) {
                    if let Some(bound) = binding.get(&Param::new(entity.value.clone(), None)) {
                        entity = bound.clone();
                    }
                }
                TermValue::Entity(entity)
            }
            Condition::Fact(optfact) => {
                let optfact = substituted(optfact, binding);
                match env.world.fluent_value(&optfact.fact) {
                    Some(value) => TermValue::Entity(value),
                    None => TermValue::Absent,
                }
            }
            _ => TermValue::Absent,
        }
    }

    /// The atoms that prevent this condition from holding, with the polarity
    /// the planner must establish. Atoms bound to still-free variables are
    /// returned lifted.
    pub fn unsatisfied_facts(&self, env: EvalEnv, binding: Option<&Substitution>) -> Vec<FactOptional> {
        match self {
            Condition::Fact(optfact) => {
                let optfact = substituted(optfact, binding);
                if holds_in_world(&optfact, env.world) {
                    Vec::new()
                } else {
                    vec![optfact]
                }
            }
            Condition::Not(inner) => {
                if !inner.is_true(env, binding) {
                    return Vec::new();
                }
                // to make the negation true, falsify the atoms of the inner
                // condition that currently hold
                let mut result = Vec::new();
                inner.visit_facts(
                    &mut |optfact, _ctx| {
                        let optfact = substituted(optfact, binding);
                        if holds_in_world(&optfact, env.world) {
                            result.push(optfact.inverted());
                        }
                    },
                    FactVisit::default(),
                );
                result
            }
            Condition::And(items) => items
                .iter()
                .flat_map(|c| c.unsatisfied_facts(env, binding))
                .collect(),
            Condition::Or(items) => {
                if items.iter().any(|c| c.is_true(env, binding)) {
                    Vec::new()
                } else {
                    items
                        .iter()
                        .flat_map(|c| c.unsatisfied_facts(env, binding))
                        .collect()
                }
            }
            Condition::Imply(antecedent, consequent) => {
                if antecedent.is_true(env, binding) {
                    consequent.unsatisfied_facts(env, binding)
                } else {
                    Vec::new()
                }
            }
            Condition::Forall(param, body) => quantifier_domain(env, param)
                .into_iter()
                .flat_map(|entity| body.unsatisfied_facts(env, Some(&extended(binding, param, entity))))
                .collect(),
            Condition::Exists(param, body) => {
                if self.is_true(env, binding) {
                    Vec::new()
                } else {
                    body.unsatisfied_facts(env, binding)
                }
            }
            Condition::Number(_) | Condition::Entity(_) => Vec::new(),
            Condition::Compare(..) => {
                if self.is_true(env, binding) {
                    return Vec::new();
                }
                // the fluents read by the comparison are what an action could
                // modify; expose them with a wildcard value
                let mut result = Vec::new();
                self.visit_facts(
                    &mut |optfact, _ctx| {
                        let mut optfact = substituted(optfact, binding);
                        if optfact.fact.predicate().is_fluent() {
                            optfact.fact.set_value(Some(Entity::any()));
                        }
                        result.push(optfact);
                    },
                    FactVisit::default(),
                );
                result
            }
        }
    }

    /// Rewrites every atom under the substitution. Quantified parameters
    /// shadow outer bindings of the same name.
    pub fn replace_parameters(&self, subst: &Substitution) -> Condition {
        match self {
            Condition::Fact(optfact) => {
                let mut optfact = optfact.clone();
                optfact.replace_arguments(subst);
                Condition::Fact(optfact)
            }
            Condition::Not(inner) => Condition::Not(Box::new(inner.replace_parameters(subst))),
            Condition::And(items) => Condition::And(items.iter().map(|c| c.replace_parameters(subst)).collect()),
            Condition::Or(items) => Condition::Or(items.iter().map(|c| c.replace_parameters(subst)).collect()),
            Condition::Imply(a, b) => Condition::Imply(
                Box::new(a.replace_parameters(subst)),
                Box::new(b.replace_parameters(subst)),
            ),
            Condition::Forall(param, body) => {
                Condition::Forall(param.clone(), Box::new(body.replace_parameters(&shadowed(subst, param))))
            }
            Condition::Exists(param, body) => {
                Condition::Exists(param.clone(), Box::new(body.replace_parameters(&shadowed(subst, param))))
            }
            Condition::Number(n) => Condition::Number(*n),
            Condition::Entity(entity) => {
                let mut entity = entity.clone();
                if entity.is_param() {
                    if let Some(bound) = subst.get(&Param::new(entity.value.clone(), None)) {
                        entity = bound.clone();
                    }
                }
                Condition::Entity(entity)
            }
            Condition::Compare(op, lhs, rhs) => Condition::Compare(
                *op,
                Box::new(lhs.replace_parameters(subst)),
                Box::new(rhs.replace_parameters(subst)),
            ),
        }
    }

    pub fn to_pddl(&self) -> String {
        match self {
            Condition::Fact(optfact) => optfact.to_pddl(false),
            Condition::Not(inner) => format!("(not {})", inner.to_pddl()),
            Condition::And(items) => {
                format!("(and {})", items.iter().map(|c| c.to_pddl()).collect::<Vec<_>>().join(" "))
            }
            Condition::Or(items) => {
                format!("(or {})", items.iter().map(|c| c.to_pddl()).collect::<Vec<_>>().join(" "))
            }
            Condition::Imply(a, b) => format!("(imply {} {})", a.to_pddl(), b.to_pddl()),
            Condition::Forall(param, body) => format!("(forall ({}) {})", param.to_pddl(), body.to_pddl()),
            Condition::Exists(param, body) => format!("(exists ({}) {})", param.to_pddl(), body.to_pddl()),
            Condition::Number(n) => {
                if n.is_integer() {
                    n.numer().to_string()
                } else {
                    format!("{}", (*n.numer() as f64) / (*n.denom() as f64))
                }
            }
            Condition::Entity(entity) => entity.value.canonical_string(),
            Condition::Compare(op, lhs, rhs) => {
                let lhs = match lhs.as_ref() {
                    Condition::Fact(optfact) => fluent_read_pddl(&optfact.fact),
                    other => other.to_pddl(),
                };
                let rhs = match rhs.as_ref() {
                    Condition::Fact(optfact) => fluent_read_pddl(&optfact.fact),
                    other => other.to_pddl(),
                };
                format!("({} {} {})", op.pddl_str(), lhs, rhs)
            }
        }
    }
}

/// A fluent read inside a comparison prints without its value slot.
fn fluent_read_pddl(fact: &crate::Fact) -> String {
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

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_pddl())
    }
}

fn substituted(optfact: &FactOptional, binding: Option<&Substitution>) -> FactOptional {
    let mut optfact = optfact.clone();
    if let Some(binding) = binding {
        optfact.replace_arguments(binding);
    }
    optfact
}

fn extended(binding: Option<&Substitution>, param: &Param, entity: &Entity) -> Substitution {
    let mut extended = binding.cloned().unwrap_or_default();
    extended.insert(param.clone(), entity.clone());
    extended
}

fn shadowed(subst: &Substitution, param: &Param) -> Substitution {
    let mut subst = subst.clone();
    subst.remove(param);
    subst
}

/// Entities a quantified parameter ranges over: constants plus problem objects
/// of a compatible type.
fn quantifier_domain<'a>(env: EvalEnv<'a>, param: &Param) -> Vec<&'a Entity> {
    let mut domain = env.ontology.constants.entities_of_type(param.tpe());
    for entity in env.objects.entities_of_type(param.tpe()) {
        if !domain.iter().any(|e| e.value == entity.value) {
            domain.push(entity);
        }
    }
    domain
}

fn compare(op: CompOp, lhs: TermValue, rhs: TermValue) -> bool {
    match op {
        CompOp::Eq => match (lhs, rhs) {
            (TermValue::Number(a), TermValue::Number(b)) => a == b,
            (TermValue::Entity(a), TermValue::Entity(b)) => match (a.number_value(), b.number_value()) {
                (Some(a), Some(b)) => a == b,
                _ => a.value == b.value,
            },
            (TermValue::Entity(e), TermValue::Number(n)) | (TermValue::Number(n), TermValue::Entity(e)) => {
                e.number_value() == Some(n)
            }
            _ => false,
        },
        _ => {
            let lhs = term_number(lhs);
            let rhs = term_number(rhs);
            match (lhs, rhs) {
                (Some(a), Some(b)) => match op {
                    CompOp::Lt => a < b,
                    CompOp::Leq => a <= b,
                    CompOp::Gt => a > b,
                    CompOp::Geq => a >= b,
                    CompOp::Eq => unreachable!(),
                },
                _ => false,
            }
        }
    }
}

fn term_number(term: TermValue) -> Option<RealValue> {
    match term {
        TermValue::Number(n) => Some(n),
        TermValue::Entity(e) => e.number_value(),
        TermValue::Absent => None,
    }
}
