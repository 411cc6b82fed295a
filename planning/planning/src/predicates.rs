use std::fmt::{Debug, Display};

use thiserror::Error;

use crate::errors::{OSpan, Spanned, ToMessage};
use crate::{Condition, Message, Param, SetOfEntities, Sym, Type, types::SetOfTypes};

#[derive(Error, Debug)]
pub enum PredicateError {
    #[error("duplicated predicate declaration `{0}`")]
    DuplicatePredicate(Sym, Sym),
    #[error("`{0}` is not a declared predicate")]
    UnknownPredicate(Sym),
    #[error("`{0}` is not a valid predicate declaration")]
    InvalidDeclaration(Sym),
}

impl ToMessage for PredicateError {
    fn to_message(self) -> Message {
        let text = self.to_string();
        match self {
            PredicateError::DuplicatePredicate(declared, previous) => {
                (&declared).invalid(text).info(&previous, "previous declaration")
            }
            PredicateError::UnknownPredicate(sym) | PredicateError::InvalidDeclaration(sym) => (&sym).invalid(text),
        }
    }
}

/// Declaration of a state predicate: a name, typed parameters and, for
/// non-Boolean fluents, the type of the returned value.
#[derive(Clone)]
pub struct Predicate {
    pub name: Sym,
    pub parameters: Vec<Param>,
    /// Return type of the fluent. Boolean predicates have none.
    pub value_type: Option<Type>,
    /// Source of the declaration of the predicate.
    pub source: OSpan,
}

impl Predicate {
    pub fn new(name: impl Into<Sym>, parameters: Vec<Param>, value_type: Option<Type>) -> Self {
        Self {
            name: name.into(),
            parameters,
            value_type,
            source: None,
        }
    }

    /// Parses a `name(?a - ta, ?b - tb)` or `name(?a - ta) - return_type` line.
    pub fn from_str(s: &str, types: &SetOfTypes) -> Result<Predicate, PredicateError> {
        let s = s.trim();
        let invalid = || PredicateError::InvalidDeclaration(Sym::from(s));
        let (head, value_type) = match s.rsplit_once(')') {
            Some((head, rest)) => {
                let rest = rest.trim();
                let value_type = match rest.strip_prefix('-') {
                    Some(name) => Some(types.name_to_type(name.trim()).map_err(|_| invalid())?),
                    None if rest.is_empty() => None,
                    None => return Err(invalid()),
                };
                (format!("{head})"), value_type)
            }
            None => (s.to_string(), None),
        };

        match head.split_once('(') {
            Some((name, args)) => {
                let args = args.strip_suffix(')').ok_or_else(invalid)?;
                let mut parameters = Vec::new();
                for arg in args.split(',') {
                    if arg.trim().is_empty() {
                        continue;
                    }
                    parameters.push(Param::from_str(arg, types).map_err(|_| invalid())?);
                }
                Ok(Predicate::new(name.trim(), parameters, value_type))
            }
            None => Ok(Predicate::new(head.trim(), Vec::new(), value_type)),
        }
    }

    pub fn name(&self) -> &Sym {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_fluent(&self) -> bool {
        self.value_type.is_some()
    }

    pub fn to_pddl(&self) -> String {
        let params = self.parameters.iter().map(|p| p.to_pddl()).collect::<Vec<_>>().join(" ");
        if params.is_empty() {
            format!("({})", self.name)
        } else {
            format!("({} {})", self.name, params)
        }
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(other.parameters.iter())
                .all(|(a, b)| a.tpe == b.tpe)
            && self.value_type == other.value_type
    }
}
impl Eq for Predicate {}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name)?;
        crate::utils::disp_iter(f, self.parameters.iter().map(|p| p.to_pddl()), ", ")?;
        write!(f, ")")?;
        if let Some(value) = &self.value_type {
            write!(f, " - {value}")?;
        }
        Ok(())
    }
}

impl Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// The predicates of an ontology, by name.
#[derive(Clone, Default)]
pub struct SetOfPredicates {
    name_to_predicate: hashbrown::HashMap<String, Predicate>,
}

impl SetOfPredicates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses newline-separated predicate declarations.
    pub fn from_str(s: &str, types: &SetOfTypes) -> Result<Self, PredicateError> {
        let mut res = Self::new();
        for line in s.lines() {
            let line = line.split(';').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            res.add(Predicate::from_str(line, types)?)?;
        }
        Ok(res)
    }

    pub fn add(&mut self, predicate: Predicate) -> Result<(), PredicateError> {
        if let Some(previous) = self.name_to_predicate.get(predicate.name.canonical_str()) {
            return Err(PredicateError::DuplicatePredicate(
                predicate.name.clone(),
                previous.name.clone(),
            ));
        }
        self.name_to_predicate.insert(predicate.name.canonical_string(), predicate);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Predicate> {
        self.name_to_predicate.get(name)
    }

    pub fn name_to_predicate(&self, name: &Sym) -> Result<Predicate, PredicateError> {
        self.get(name.canonical_str())
            .cloned()
            .ok_or_else(|| PredicateError::UnknownPredicate(name.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> + '_ {
        self.name_to_predicate.values()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_predicate.is_empty()
    }
}

impl Debug for SetOfPredicates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.name_to_predicate.keys().collect();
        names.sort();
        write!(f, "SetOfPredicates({})", names.iter().map(|n| n.as_str()).collect::<Vec<_>>().join(", "))
    }
}

/// A predicate whose truth is defined by a condition over other predicates.
/// Uses of it in conditions expand to the stored condition.
#[derive(Clone, Debug)]
pub struct DerivedPredicate {
    pub predicate: Predicate,
    pub condition: Condition,
}

impl DerivedPredicate {
    pub fn new(predicate: Predicate, condition: Condition) -> Self {
        Self { predicate, condition }
    }
}

/// The typed vocabulary of a domain.
#[derive(Clone, Default, Debug)]
pub struct Ontology {
    pub types: SetOfTypes,
    pub constants: SetOfEntities,
    pub predicates: SetOfPredicates,
    pub derived_predicates: hashbrown::HashMap<String, DerivedPredicate>,
}

impl Ontology {
    pub fn add_derived_predicate(&mut self, derived: DerivedPredicate) {
        self.derived_predicates
            .insert(derived.predicate.name.canonical_string(), derived);
    }

    pub fn derived_predicate(&self, name: &str) -> Option<&DerivedPredicate> {
        self.derived_predicates.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_parsing() {
        let types = SetOfTypes::from_pddl("ent").unwrap();
        let predicates = SetOfPredicates::from_str("lock(?e - ent)\nfact_a", &types).unwrap();

        let lock = predicates.get("lock").unwrap();
        assert_eq!(lock.arity(), 1);
        assert!(!lock.is_fluent());
        assert_eq!(lock.parameters[0].name.canonical_str(), "?e");

        let fact_a = predicates.get("fact_a").unwrap();
        assert_eq!(fact_a.arity(), 0);
        assert!(predicates.get("unknown").is_none());
    }

    #[test]
    fn fluent_parsing() {
        let types = SetOfTypes::from_pddl("my_type my_type2 my_type3 - entity\nsub_my_type3 - my_type3").unwrap();
        let predicates = SetOfPredicates::from_str("fun1(?e - my_type3) - entity", &types).unwrap();
        let fun1 = predicates.get("fun1").unwrap();
        assert!(fun1.is_fluent());
        assert_eq!(fun1.value_type.as_ref().unwrap().name().canonical_str(), "entity");
    }

    #[test]
    fn duplicate_predicate() {
        let types = SetOfTypes::new();
        assert!(SetOfPredicates::from_str("fact_a\nfact_a", &types).is_err());
    }
}
