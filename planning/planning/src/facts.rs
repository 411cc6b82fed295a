use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

use smallvec::SmallVec;
use thiserror::Error;

use crate::errors::{Spanned, ToMessage};
use crate::{Entity, Message, Param, Predicate, Sym, types::SetOfTypes};

pub type Arguments = SmallVec<[Entity; 3]>;

#[derive(Error, Debug)]
pub enum FactError {
    #[error("`{0}` is applied to {1} arguments but expects {2}")]
    ArityMismatch(Sym, usize, usize),
    #[error("argument `{1}` is not compatible with the declared type of `{0}`")]
    IncompatibleArgument(Sym, Sym),
    #[error("`{0}` is a fluent and must carry a value")]
    MissingValue(Sym),
    #[error("`{0}` is not a fluent and cannot carry a value")]
    UnexpectedValue(Sym),
    #[error("value `{1}` is not compatible with the fluent type of `{0}`")]
    IncompatibleValue(Sym, Sym),
}

impl ToMessage for FactError {
    fn to_message(self) -> Message {
        let text = self.to_string();
        match self {
            FactError::ArityMismatch(sym, _, _)
            | FactError::MissingValue(sym)
            | FactError::UnexpectedValue(sym) => (&sym).invalid(text),
            FactError::IncompatibleArgument(sym, arg) | FactError::IncompatibleValue(sym, arg) => {
                (&arg).invalid(text).info(&sym, "in application of")
            }
        }
    }
}

/// A ground or partially-lifted application of a predicate, possibly carrying
/// a fluent value: `name(arg1, ..., argn)[=value]`.
#[derive(Clone)]
pub struct Fact {
    predicate: Predicate,
    arguments: Arguments,
    value: Option<Entity>,
    is_value_negated: bool,
}

impl Fact {
    pub fn new(
        predicate: Predicate,
        arguments: impl IntoIterator<Item = Entity>,
        value: Option<Entity>,
        is_value_negated: bool,
    ) -> Result<Fact, FactError> {
        let arguments: Arguments = arguments.into_iter().collect();
        if arguments.len() != predicate.arity() {
            return Err(FactError::ArityMismatch(
                predicate.name.clone(),
                arguments.len(),
                predicate.arity(),
            ));
        }
        for (argument, declared) in arguments.iter().zip(predicate.parameters.iter()) {
            if argument.is_any() {
                continue;
            }
            if let (Some(actual), Some(expected)) = (&argument.tpe, &declared.tpe) {
                if !actual.is_a(expected) {
                    return Err(FactError::IncompatibleArgument(
                        predicate.name.clone(),
                        argument.value.clone(),
                    ));
                }
            }
        }
        match (&predicate.value_type, &value) {
            (Some(_), None) => return Err(FactError::MissingValue(predicate.name.clone())),
            (None, Some(_)) => return Err(FactError::UnexpectedValue(predicate.name.clone())),
            (Some(expected), Some(value)) => {
                if !(value.is_any() || value.is_undefined() || value.tpe.is_none()) {
                    let actual = value.tpe.as_ref().unwrap();
                    if !actual.is_a(expected) {
                        return Err(FactError::IncompatibleValue(predicate.name.clone(), value.value.clone()));
                    }
                }
            }
            (None, None) => {}
        }
        Ok(Fact {
            predicate,
            arguments,
            value,
            is_value_negated,
        })
    }

    pub fn name(&self) -> &Sym {
        &self.predicate.name
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn arguments(&self) -> &[Entity] {
        &self.arguments
    }

    pub fn value(&self) -> Option<&Entity> {
        self.value.as_ref()
    }

    pub fn is_value_negated(&self) -> bool {
        self.is_value_negated
    }

    pub(crate) fn set_value_negated(&mut self, negated: bool) {
        self.is_value_negated = negated;
    }

    pub fn set_value(&mut self, value: Option<Entity>) {
        self.value = value;
    }

    /// True if an argument or the value is a variable or the wildcard.
    pub fn has_a_param_to_fill(&self) -> bool {
        self.arguments.iter().any(|a| a.is_a_param_to_fill())
            || self.value.as_ref().is_some_and(|v| v.is_a_param_to_fill())
    }

    /// Exact-lookup key including the fluent value, e.g. `at(r1, kitchen)=true`.
    pub fn exact_call(&self) -> String {
        match &self.value {
            Some(value) => format!("{}={}", self.exact_call_without_value(), value.value),
            None => self.exact_call_without_value(),
        }
    }

    /// Exact-lookup key over name and arguments only.
    pub fn exact_call_without_value(&self) -> String {
        let args = self
            .arguments
            .iter()
            .map(|a| a.value.canonical_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name(), args)
    }

    /// The signature of this fact at its own type level, `name(T1, ..., Tn)`.
    pub fn direct_signature(&self) -> String {
        let args = self
            .arguments
            .iter()
            .map(|a| a.tpe.as_ref().map(|t| t.name().canonical_str()).unwrap_or(""))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name(), args)
    }

    /// Type-broadened signature keys: every `name(T1, ..., Tn)` where each `Ti`
    /// ranges over the argument's type and its transitive ancestors and
    /// descendants. Used for symmetric lookups across the subtype lattice.
    pub fn signatures(&self, types: &SetOfTypes) -> Vec<String> {
        let mut per_argument: Vec<Vec<String>> = Vec::with_capacity(self.arguments.len());
        for argument in &self.arguments {
            match &argument.tpe {
                None => per_argument.push(vec![String::new()]),
                Some(tpe) => {
                    let mut names = vec![tpe.name().canonical_string()];
                    names.extend(tpe.ancestors().iter().map(|t| t.name().canonical_string()));
                    names.extend(types.descendants(tpe).iter().map(|t| t.name().canonical_string()));
                    names.sort();
                    names.dedup();
                    per_argument.push(names);
                }
            }
        }
        let mut keys = vec![String::new()];
        for names in &per_argument {
            let mut next = Vec::with_capacity(keys.len() * names.len());
            for key in &keys {
                for name in names {
                    if key.is_empty() {
                        next.push(name.clone());
                    } else {
                        next.push(format!("{key}, {name}"));
                    }
                }
            }
            keys = next;
        }
        keys.into_iter().map(|k| format!("{}({})", self.name(), k)).collect()
    }

    /// Rewrites arguments and value that are bound by the given substitution.
    pub fn replace_arguments(&mut self, subst: &BTreeMap<Param, Entity>) {
        let lookup = |entity: &mut Entity| {
            if entity.is_param() {
                let probe = Param::new(entity.value.clone(), None);
                if let Some(replacement) = subst.get(&probe) {
                    *entity = replacement.clone();
                }
            }
        };
        for argument in &mut self.arguments {
            lookup(argument);
        }
        if let Some(value) = &mut self.value {
            lookup(value);
        }
    }

    /// Equality on the applied predicate only, disregarding the arguments and
    /// the fluent value. Used to detect potential contradictions.
    pub fn equal_excluding_args_and_value(&self, other: &Fact) -> bool {
        self.name() == other.name()
    }

    pub fn to_pddl(&self, in_effect_context: bool) -> String {
        let args = self
            .arguments
            .iter()
            .map(|a| a.value.canonical_str())
            .collect::<Vec<_>>()
            .join(" ");
        let application = if args.is_empty() {
            format!("({})", self.name())
        } else {
            format!("({} {})", self.name(), args)
        };
        match &self.value {
            None => application,
            Some(value) => {
                let operator = if in_effect_context { "assign" } else { "=" };
                let assignment = format!("({} {} {})", operator, application, value.value);
                if self.is_value_negated && !in_effect_context {
                    format!("(not {assignment})")
                } else {
                    assignment
                }
            }
        }
    }
}

impl Display for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.exact_call_without_value())?;
        if let Some(value) = &self.value {
            if self.is_value_negated {
                write!(f, "!={}", value.value)?;
            } else {
                write!(f, "={}", value.value)?;
            }
        }
        Ok(())
    }
}
impl Debug for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl PartialEq for Fact {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
            && self.arguments == other.arguments
            && self.value == other.value
            && self.is_value_negated == other.is_value_negated
    }
}
impl Eq for Fact {}
impl PartialOrd for Fact {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Fact {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name()
            .cmp(other.name())
            .then_with(|| self.arguments.cmp(&other.arguments))
            .then_with(|| self.value.cmp(&other.value))
            .then_with(|| self.is_value_negated.cmp(&other.is_value_negated))
    }
}
impl std::hash::Hash for Fact {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name().hash(state);
        self.arguments.hash(state);
        self.value.hash(state);
        self.is_value_negated.hash(state);
    }
}

/// A fact together with its polarity.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FactOptional {
    pub is_negated: bool,
    pub fact: Fact,
}

impl FactOptional {
    pub fn new(fact: Fact, is_negated: bool) -> FactOptional {
        let mut res = FactOptional { is_negated, fact };
        res.simplify();
        res
    }

    pub fn positive(fact: Fact) -> FactOptional {
        FactOptional::new(fact, false)
    }

    pub fn negated(fact: Fact) -> FactOptional {
        FactOptional::new(fact, true)
    }

    pub fn inverted(&self) -> FactOptional {
        FactOptional::new(self.fact.clone(), !self.is_negated)
    }

    // A negated fact whose value is itself negated is rewritten as positive.
    fn simplify(&mut self) {
        if self.is_negated && self.fact.is_value_negated() {
            self.is_negated = false;
            self.fact.set_value_negated(false);
        }
    }

    pub fn replace_arguments(&mut self, subst: &BTreeMap<Param, Entity>) {
        self.fact.replace_arguments(subst);
    }

    pub fn to_pddl(&self, in_effect_context: bool) -> String {
        if self.is_negated && self.fact.value().is_some_and(|v| v.is_any()) {
            // "no value at all" prints as an assignment to undefined
            let mut undefined = self.fact.clone();
            undefined.set_value(Some(Entity::undefined()));
            return undefined.to_pddl(in_effect_context);
        }
        let inner = self.fact.to_pddl(in_effect_context);
        if self.is_negated {
            format!("(not {inner})")
        } else {
            inner
        }
    }
}

impl Display for FactOptional {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_negated {
            write!(f, "!")?;
        }
        write!(f, "{}", self.fact)
    }
}
impl Debug for FactOptional {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SetOfEntities, SetOfPredicates};

    fn fixture() -> (SetOfTypes, SetOfPredicates, SetOfEntities) {
        let types = SetOfTypes::from_pddl("my_type my_type2 my_type3 - entity\nsub_my_type3 - my_type3").unwrap();
        let predicates = SetOfPredicates::from_str("fun1(?e - my_type3) - entity\npred_a(?e - entity)", &types).unwrap();
        let entities = SetOfEntities::from_pddl("sub3a - sub_my_type3\ntoto - entity", &types).unwrap();
        (types, predicates, entities)
    }

    #[test]
    fn signatures_cover_the_subtype_lattice() {
        let (types, predicates, entities) = fixture();
        let fun1 = predicates.get("fun1").unwrap().clone();
        let sub3a = entities.value_to_entity("sub3a").unwrap().clone();
        let toto = entities.value_to_entity("toto").unwrap().clone();

        let fact = Fact::new(fun1, [sub3a], Some(toto), false).unwrap();
        let mut signatures = fact.signatures(&types);
        signatures.sort();
        assert_eq!(signatures, vec!["fun1(entity)", "fun1(my_type3)", "fun1(sub_my_type3)"]);
        assert_eq!(fact.direct_signature(), "fun1(sub_my_type3)");
        assert_eq!(fact.exact_call(), "fun1(sub3a)=toto");
        assert_eq!(fact.exact_call_without_value(), "fun1(sub3a)");
    }

    #[test]
    fn arity_and_types_are_validated() {
        let (_types, predicates, entities) = fixture();
        let pred_a = predicates.get("pred_a").unwrap().clone();
        let fun1 = predicates.get("fun1").unwrap().clone();
        let toto = entities.value_to_entity("toto").unwrap().clone();
        let sub3a = entities.value_to_entity("sub3a").unwrap().clone();

        // too many arguments
        assert!(Fact::new(pred_a.clone(), [toto.clone(), toto.clone()], None, false).is_err());
        // `toto` is an entity but not a my_type3
        assert!(Fact::new(fun1.clone(), [toto.clone()], Some(toto.clone()), false).is_err());
        // missing fluent value
        assert!(Fact::new(fun1.clone(), [sub3a.clone()], None, false).is_err());
        // value on a non-fluent
        assert!(Fact::new(pred_a, [toto.clone()], Some(toto), false).is_err());
        assert!(Fact::new(fun1, [sub3a.clone()], Some(Entity::undefined()), false).is_ok());
    }

    #[test]
    fn double_negation_simplifies() {
        let (_types, predicates, entities) = fixture();
        let fun1 = predicates.get("fun1").unwrap().clone();
        let sub3a = entities.value_to_entity("sub3a").unwrap().clone();
        let toto = entities.value_to_entity("toto").unwrap().clone();

        let fact = Fact::new(fun1, [sub3a], Some(toto), true).unwrap();
        let opt = FactOptional::new(fact, true);
        assert!(!opt.is_negated);
        assert!(!opt.fact.is_value_negated());
    }

    #[test]
    fn substitution() {
        let (types, predicates, entities) = fixture();
        let pred_a = predicates.get("pred_a").unwrap().clone();
        let entity = types.name_to_type("entity").unwrap();
        let param = Param::new("?x", Some(entity));

        let mut fact = Fact::new(pred_a, [param.to_entity()], None, false).unwrap();
        assert!(fact.has_a_param_to_fill());

        let mut subst = BTreeMap::new();
        subst.insert(param, entities.value_to_entity("toto").unwrap().clone());
        fact.replace_arguments(&subst);
        assert!(!fact.has_a_param_to_fill());
        assert_eq!(fact.exact_call_without_value(), "pred_a(toto)");
    }
}
