use std::fmt::{Display, Error, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{ErrorMessageExt, OSpan, Span, Spanned};
use crate::pddl::input::Input;
use crate::pddl::sexpr::*;
use crate::utils::disp_iter;
use crate::{Res, Sym};

pub fn parse_pddl_domain(pb: Input) -> Res<Domain> {
    let pb = Arc::new(pb);
    let expr = parse(pb.clone())?;
    read_domain(expr).title("Invalid domain")
}
pub fn parse_pddl_problem(pb: Input) -> Res<Problem> {
    let pb = Arc::new(pb);
    let expr = parse(pb.clone())?;
    read_problem(expr).title("Invalid problem")
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PddlFeature {
    Strips,
    Typing,
    NegativePreconditions,
    DisjunctivePreconditions,
    Equality,
    ConditionalEffects,
    QuantifiedPreconditions,
    Fluents,
    DerivedPredicates,
}

impl FromStr for PddlFeature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ":strips" => Ok(PddlFeature::Strips),
            ":typing" => Ok(PddlFeature::Typing),
            ":negative-preconditions" => Ok(PddlFeature::NegativePreconditions),
            ":disjunctive-preconditions" => Ok(PddlFeature::DisjunctivePreconditions),
            ":equality" => Ok(PddlFeature::Equality),
            ":conditional-effects" => Ok(PddlFeature::ConditionalEffects),
            ":quantified-preconditions" => Ok(PddlFeature::QuantifiedPreconditions),
            ":fluents" => Ok(PddlFeature::Fluents),
            ":derived-predicates" => Ok(PddlFeature::DerivedPredicates),
            _ => Err(format!("Unknown feature `{s}`")),
        }
    }
}
impl Display for PddlFeature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let formatted = match self {
            PddlFeature::Strips => ":strips",
            PddlFeature::Typing => ":typing",
            PddlFeature::NegativePreconditions => ":negative-preconditions",
            PddlFeature::DisjunctivePreconditions => ":disjunctive-preconditions",
            PddlFeature::Equality => ":equality",
            PddlFeature::ConditionalEffects => ":conditional-effects",
            PddlFeature::QuantifiedPreconditions => ":quantified-preconditions",
            PddlFeature::Fluents => ":fluents",
            PddlFeature::DerivedPredicates => ":derived-predicates",
        };
        write!(f, "{formatted}")
    }
}

/// A symbol with its optional declared type, as it appears in typed lists.
#[derive(Debug, Clone)]
pub struct TypedSymbol {
    pub symbol: Sym,
    pub tpe: Option<Sym>,
}

impl TypedSymbol {
    pub fn new(symbol: impl Into<Sym>, tpe: impl Into<Sym>) -> TypedSymbol {
        TypedSymbol {
            symbol: symbol.into(),
            tpe: Some(tpe.into()),
        }
    }
}

impl Display for TypedSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match &self.tpe {
            Some(tpe) => write!(f, "{}: {}", self.symbol, tpe),
            None => write!(f, "{}", self.symbol),
        }
    }
}

/// A PDDL predicate declaration, i.e. a state function whose codomain is the
/// set of booleans.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub name: Sym,
    pub args: Vec<TypedSymbol>,
    pub source: OSpan,
}
impl Display for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}(", self.name)?;
        disp_iter(f, self.args.as_slice(), ", ")?;
        write!(f, ")")
    }
}

/// A PDDL function declaration, i.e. a state function whose codomain is given
/// by its type annotation (`number` when absent).
#[derive(Debug, Clone)]
pub struct Function {
    pub name: Sym,
    pub args: Vec<TypedSymbol>,
    pub tpe: Option<Sym>,
    pub source: OSpan,
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name)?;
        disp_iter(f, self.args.as_slice(), ", ")?;
        write!(f, ")")
    }
}

#[derive(Clone, Debug)]
pub struct Action {
    pub name: Sym,
    pub args: Vec<TypedSymbol>,
    pub pre: Vec<SExpr>,
    pub eff: Vec<SExpr>,
    /// Span covering the entire action definition
    pub span: Span,
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}(", self.name)?;
        disp_iter(f, self.args.as_slice(), ", ")?;
        write!(f, ")")
    }
}

#[derive(Clone, Debug)]
pub struct Event {
    pub name: Sym,
    pub args: Vec<TypedSymbol>,
    pub pre: Vec<SExpr>,
    pub eff: Vec<SExpr>,
    /// Span covering the entire event definition
    pub span: Span,
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}(", self.name)?;
        disp_iter(f, self.args.as_slice(), ", ")?;
        write!(f, ")")
    }
}

/// A `(:derived (head ...) <condition>)` block.
#[derive(Clone, Debug)]
pub struct Derived {
    pub head: SExpr,
    pub body: SExpr,
}

#[derive(Debug, Clone)]
pub struct Domain {
    pub name: Sym,
    pub features: Vec<PddlFeature>,
    pub types: Vec<TypedSymbol>,
    pub constants: Vec<TypedSymbol>,
    pub predicates: Vec<Predicate>,
    pub functions: Vec<Function>,
    pub actions: Vec<Action>,
    pub events: Vec<Event>,
    pub derived: Vec<Derived>,
    pub timeless: Vec<SExpr>,
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "# Domain : {}", self.name)?;
        write!(f, "\n# Types \n  ")?;
        disp_iter(f, self.types.as_slice(), "\n  ")?;
        write!(f, "\n# Predicates \n  ")?;
        disp_iter(f, self.predicates.as_slice(), "\n  ")?;
        write!(f, "\n# Functions \n  ")?;
        disp_iter(f, self.functions.as_slice(), "\n  ")?;
        write!(f, "\n# Actions \n  ")?;
        disp_iter(f, self.actions.as_slice(), "\n  ")?;
        write!(f, "\n# Events \n  ")?;
        disp_iter(f, self.events.as_slice(), "\n  ")?;
        Result::Ok(())
    }
}

/// Consume a typed list of symbols
///  - (a - loc b - loc c - loc) : symbols a, b and c of type loc
///  - (a b c - loc)  : symbols a, b and c of type loc
///  - (a b c) : symbols a b and c, untyped
pub fn consume_typed_symbols(input: &mut ListIter) -> Res<Vec<TypedSymbol>> {
    let mut args = Vec::with_capacity(input.len() / 3);
    let mut untyped: Vec<Sym> = Vec::with_capacity(args.len());
    while !input.is_empty() {
        let next = input.pop_atom()?;
        if next.canonical_str() == "-" {
            let tpe = input.pop_atom()?;
            untyped
                .drain(..)
                .map(|name| TypedSymbol::new(name, tpe))
                .for_each(|a| args.push(a));
        } else {
            untyped.push(next.into());
        }
    }
    // no type given
    untyped
        .drain(..)
        .map(|name| TypedSymbol { symbol: name, tpe: None })
        .for_each(|a| args.push(a));
    Result::Ok(args)
}

fn read_domain(dom: SExpr) -> Res<Domain> {
    let dom = &mut dom.as_list_iter().ok_or_else(|| dom.invalid("Expected a list"))?;

    dom.pop_known_atom("define")?;

    // extract the name of the domain, of the form `(domain XXX)`
    let mut domain_name_decl = dom.pop_list()?.iter();
    domain_name_decl.pop_known_atom("domain")?;
    let name = domain_name_decl.pop_atom().title("missing name of domain")?.clone();

    let mut res = Domain {
        name,
        features: vec![],
        types: vec![],
        constants: vec![],
        predicates: vec![],
        functions: vec![],
        actions: vec![],
        events: vec![],
        derived: vec![],
        timeless: vec![],
    };

    for current in dom {
        // a property associates a key (e.g. `:predicates`) to a value or a sequence of values
        let mut property = current
            .as_list_iter()
            .ok_or_else(|| current.invalid("expected a property list"))?;

        match property.pop_atom()?.canonical_str() {
            ":requirements" => {
                for feature in property {
                    let feature = feature
                        .as_atom()
                        .ok_or_else(|| feature.invalid("Expected feature name but got list"))?;
                    let f = PddlFeature::from_str(feature.canonical_str()).map_err(|e| feature.invalid(e))?;

                    res.features.push(f);
                }
            }
            ":predicates" => {
                for pred in property {
                    let mut pred_list = pred.as_list_iter().ok_or_else(|| pred.invalid("Expected a list"))?;
                    let name = pred_list.pop_atom()?.clone();
                    let args = consume_typed_symbols(&mut pred_list)?;
                    res.predicates.push(Predicate {
                        name,
                        args,
                        source: Some(pred.loc()),
                    });
                }
            }
            ":types" => {
                if !res.types.is_empty() {
                    return Err(current.invalid("More than one ':types' section definition"));
                }
                let types = consume_typed_symbols(&mut property)?;
                res.types = types;
            }
            ":constants" => {
                if !res.constants.is_empty() {
                    return Err(current.invalid("More than one ':constants' section definition"));
                }
                let constants = consume_typed_symbols(&mut property)?;
                res.constants = constants;
            }
            ":functions" => {
                while let Ok(func) = property.pop() {
                    // element is necessarily a function name and parameters, e.g., (battery ?r)
                    let source = func.loc();
                    let mut func = func.as_list_iter().ok_or_else(|| func.invalid("Expected a list"))?;
                    let name = func.pop_atom()?.clone();
                    let args = consume_typed_symbols(&mut func)?;

                    // from PDDL 3.1, it can have a type annotation, e.g., (battery ?r) - number
                    // which allows distinguishing numeric and object fluents
                    let tpe = if property.peek().is_some_and(|a| a.is_atom("-")) {
                        property.pop_known_atom("-")?;
                        Some(property.pop_atom().title("expected a type")?.clone())
                    } else {
                        None
                    };
                    res.functions.push(Function {
                        name,
                        args,
                        tpe,
                        source: Some(source),
                    });
                }
            }
            ":action" => {
                let name = property.pop_atom()?.clone();
                let mut args = Vec::new();
                let mut pre = Vec::new();
                let mut eff = Vec::new();
                while !property.is_empty() {
                    let key_expr = property.pop_atom()?;
                    let value = property
                        .pop()
                        .tag(key_expr, "No value associated to key", None)?;
                    match key_expr.canonical_str() {
                        ":parameters" => {
                            if !args.is_empty() {
                                return Err(key_expr.invalid("Duplicated ':parameters' tag is not allowed"));
                            }
                            let mut value = value
                                .as_list_iter()
                                .ok_or_else(|| value.invalid("Expected a parameter list"))?;
                            for a in consume_typed_symbols(&mut value)? {
                                args.push(a);
                            }
                        }
                        ":precondition" => {
                            pre.push(value.clone());
                        }
                        ":effect" => {
                            eff.push(value.clone());
                        }
                        _ => return Err(key_expr.invalid("unsupported key in action")),
                    }
                }
                res.actions.push(Action {
                    name,
                    args,
                    pre,
                    eff,
                    span: current.loc(),
                })
            }
            ":event" => {
                let name = property.pop_atom()?.clone();
                let mut args = Vec::new();
                let mut pre = Vec::new();
                let mut eff = Vec::new();
                while !property.is_empty() {
                    let key_expr = property.pop_atom()?;
                    let value = property
                        .pop()
                        .tag(key_expr, "No value associated to key", None)?;
                    match key_expr.canonical_str() {
                        ":parameters" => {
                            if !args.is_empty() {
                                return Err(key_expr.invalid("Duplicated ':parameters' tag is not allowed"));
                            }
                            let mut value = value
                                .as_list_iter()
                                .ok_or_else(|| value.invalid("Expected a parameter list"))?;
                            for a in consume_typed_symbols(&mut value)? {
                                args.push(a);
                            }
                        }
                        ":precondition" => {
                            pre.push(value.clone());
                        }
                        ":effect" => {
                            eff.push(value.clone());
                        }
                        _ => return Err(key_expr.invalid("unsupported key in event")),
                    }
                }
                res.events.push(Event {
                    name,
                    args,
                    pre,
                    eff,
                    span: current.loc(),
                })
            }
            ":derived" => {
                let head = property.pop().title("Missing derived predicate head")?.clone();
                let body = property.pop().title("Missing derived predicate condition")?.clone();
                if let Ok(unexpected) = property.pop() {
                    return Err(unexpected.invalid("Expected end of derived predicate definition"));
                }
                res.derived.push(Derived { head, body });
            }
            ":timeless" => {
                for fact in property {
                    res.timeless.push(fact.clone());
                }
            }
            _ => return Err(current.invalid("unsupported block")),
        }
    }
    Ok(res)
}

#[derive(Clone, Debug)]
pub struct Problem {
    pub problem_name: Sym,
    pub domain_name: Sym,
    pub objects: Vec<TypedSymbol>,
    pub init: Vec<SExpr>,
    pub goal: Vec<SExpr>,
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "# Problem {} (domain: {})", &self.problem_name, &self.domain_name)?;
        write!(f, "\n# Objects \n  ")?;
        disp_iter(f, self.objects.as_slice(), "\n  ")?;
        write!(f, "\n# Init \n  ")?;
        disp_iter(f, self.init.as_slice(), "\n  ")?;
        write!(f, "\n# Goal \n  ")?;
        disp_iter(f, self.goal.as_slice(), "\n  ")?;
        Result::Ok(())
    }
}

fn read_problem(problem: SExpr) -> Res<Problem> {
    let mut problem = problem
        .as_list_iter()
        .ok_or_else(|| problem.invalid("Expected a list"))?;
    problem.pop_known_atom("define")?;

    let mut problem_name = problem
        .pop_list()
        .title("Expected problem name definition of the form '(problem XXXXXX)'")?
        .iter();
    problem_name.pop_known_atom("problem")?;
    let problem_name = problem_name.pop_atom()?.clone();

    let mut domain_name_def = problem.pop_list()?.iter();
    domain_name_def.pop_known_atom(":domain")?;
    let domain_name = domain_name_def.pop_atom()?.clone();

    let mut res = Problem {
        problem_name,
        domain_name,
        objects: vec![],
        init: vec![],
        goal: vec![],
    };

    for current in problem {
        // a property associates a key (e.g. `:objects`) to a value or a sequence of values
        let mut property = current
            .as_list_iter()
            .ok_or_else(|| current.invalid("Expected a list"))?;
        match property.pop_atom()?.canonical_str() {
            ":requirements" => {} // ignore requirements restated in the problem
            ":objects" => {
                let objects = consume_typed_symbols(&mut property)?;
                for o in objects {
                    res.objects.push(o);
                }
            }
            ":init" => {
                for fact in property {
                    res.init.push(fact.clone());
                }
            }
            ":goal" => {
                for goal in property {
                    res.goal.push(goal.clone());
                }
            }
            _ => return Err(current.invalid("unsupported block")),
        }
    }

    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pddl::input::Input;

    #[test]
    fn domain_structure() {
        let source = "(define (domain locks)
            (:requirements :strips :typing :negative-preconditions)
            (:types ent)
            (:constants e1 e2 e3 - ent)
            (:predicates (lock ?e - ent) (fact_a))
            (:action unlock
                :parameters (?e - ent)
                :effect (not (lock ?e)))
            (:action finish
                :parameters ()
                :precondition (not (lock e2))
                :effect (fact_a)))";
        let dom = parse_pddl_domain(Input::from_string(source)).unwrap();
        assert_eq!(dom.name.canonical_str(), "locks");
        assert_eq!(dom.features.len(), 3);
        assert_eq!(dom.types.len(), 1);
        assert_eq!(dom.constants.len(), 3);
        assert_eq!(dom.predicates.len(), 2);
        assert_eq!(dom.actions.len(), 2);
        assert_eq!(dom.actions[0].args.len(), 1);
        assert_eq!(dom.actions[1].pre.len(), 1);
    }

    #[test]
    fn problem_structure() {
        let source = "(define (problem locks-1)
            (:domain locks)
            (:objects)
            (:init (lock e2))
            (:goal (and (fact_a))))";
        let pb = parse_pddl_problem(Input::from_string(source)).unwrap();
        assert_eq!(pb.problem_name.canonical_str(), "locks-1");
        assert_eq!(pb.domain_name.canonical_str(), "locks");
        assert_eq!(pb.init.len(), 1);
        assert_eq!(pb.goal.len(), 1);
    }

    #[test]
    fn unknown_requirement_is_rejected() {
        let source = "(define (domain d) (:requirements :durative-actions))";
        assert!(parse_pddl_domain(Input::from_string(source)).is_err());
    }

    #[test]
    fn unknown_block_is_rejected() {
        let source = "(define (domain d) (:methods))";
        assert!(parse_pddl_domain(Input::from_string(source)).is_err());
    }
}
