use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Display};

use num_rational::Rational64;
use thiserror::Error;

use crate::errors::{Spanned, ToMessage};
use crate::{Message, Param, Sym, Type, types::SetOfTypes};

pub type IntValue = i64;
pub type RealValue = Rational64;

/// Parse a number ("32", "-3", "3.14", "-323.3") into an exact rational.
pub fn parse_number(decimal_str: &str) -> Option<RealValue> {
    if let Ok(i) = decimal_str.parse::<IntValue>() {
        Some(RealValue::new(i, 1))
    } else {
        let negative = decimal_str.starts_with('-');
        let unsigned = decimal_str.strip_prefix('-').unwrap_or(decimal_str);
        let (lhs, rhs) = unsigned.split_once('.')?;
        let num_digits = rhs.len() as u32;
        let denom = 10i64.checked_pow(num_digits)?;
        let lhs: i64 = if lhs.is_empty() { 0 } else { lhs.parse().ok()? };
        let rhs: i64 = if rhs.is_empty() { 0 } else { rhs.parse().ok()? };
        if rhs >= denom {
            return None;
        }
        let numer = lhs * denom + rhs;
        let numer = if negative { -numer } else { numer };
        Some(RealValue::new(numer, denom))
    }
}

/// A term of the model: a declared constant or object, a number, a variable
/// (value starts with `?`), the wildcard `*`, or the `undefined` sentinel.
#[derive(Clone)]
pub struct Entity {
    pub value: Sym,
    pub tpe: Option<Type>,
}

impl Entity {
    pub const ANY_VALUE: &'static str = "*";
    pub const UNDEFINED_VALUE: &'static str = "undefined";

    pub fn new(value: impl Into<Sym>, tpe: Option<Type>) -> Self {
        Self { value: value.into(), tpe }
    }

    /// The wildcard entity, compatible with any value.
    pub fn any() -> Entity {
        Entity::new(Entity::ANY_VALUE, None)
    }

    /// The sentinel standing for the absence of a fluent value.
    pub fn undefined() -> Entity {
        Entity::new(Entity::UNDEFINED_VALUE, None)
    }

    pub fn number(value: impl Into<Sym>) -> Entity {
        Entity::new(value, Some(Type::number()))
    }

    pub fn from_number(value: RealValue) -> Entity {
        let repr = if value.is_integer() {
            value.numer().to_string()
        } else {
            value.to_string()
        };
        Entity::number(repr)
    }

    /// Parses a `value - type` declaration.
    pub fn from_declaration(s: &str, types: &SetOfTypes) -> Result<Entity, EntityError> {
        match s.split_once('-') {
            Some((value, tpe)) => {
                let tpe = types.name_to_type(tpe.trim()).map_err(|_| EntityError::UnknownType(Sym::from(tpe.trim())))?;
                Ok(Entity::new(value.trim(), Some(tpe)))
            }
            None => {
                let value = s.trim();
                if types.is_empty() {
                    Ok(Entity::new(value, None))
                } else {
                    Err(EntityError::MissingTypeDeclaration(Sym::from(value)))
                }
            }
        }
    }

    pub fn is_any(&self) -> bool {
        self.value.canonical_str() == Entity::ANY_VALUE
    }

    pub fn is_undefined(&self) -> bool {
        self.value.canonical_str() == Entity::UNDEFINED_VALUE
    }

    pub fn is_param(&self) -> bool {
        self.value.is_variable()
    }

    /// True for slots the planner still has to bind: variables and the wildcard.
    pub fn is_a_param_to_fill(&self) -> bool {
        self.is_param() || self.is_any()
    }

    pub fn is_number(&self) -> bool {
        self.tpe.as_ref().is_some_and(|t| t.name().canonical_str() == Type::NUMBER_TYPE_NAME)
    }

    /// Numeric view of the entity value, when it is a number.
    pub fn number_value(&self) -> Option<RealValue> {
        parse_number(self.value.canonical_str())
    }

    pub fn to_param(&self) -> Param {
        Param::new(self.value.clone(), self.tpe.clone())
    }

    /// True if this entity is the variable bound by `param`, with a compatible type.
    pub fn matches_param(&self, param: &Param) -> bool {
        if self.value != param.name {
            return false;
        }
        match (&self.tpe, &param.tpe) {
            (Some(t), Some(pt)) => t.is_a(pt),
            _ => true,
        }
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}
impl Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tpe {
            Some(tpe) => write!(f, "{} - {}", self.value, tpe),
            None => write!(f, "{}", self.value),
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.tpe == other.tpe
    }
}
impl Eq for Entity {}
impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entity {
    // Total order on (value, type name), required for use as a map key.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| match (&self.tpe, &other.tpe) {
                (None, None) => std::cmp::Ordering::Equal,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (Some(_), None) => std::cmp::Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}
impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
        self.tpe.as_ref().map(|t| t.name()).hash(state);
    }
}

#[derive(Error, Debug)]
pub enum EntityError {
    #[error("duplicate entity: {0} and {1}")]
    DuplicateEntityDeclaration(Sym, Sym),
    #[error("unknown entity {0}")]
    UnknownEntity(Sym),
    #[error("`{0}` is not a declared type")]
    UnknownType(Sym),
    #[error("missing type for entities declaration: `{0}`")]
    MissingTypeDeclaration(Sym),
}

impl ToMessage for EntityError {
    fn to_message(self) -> Message {
        let text = self.to_string();
        match self {
            EntityError::DuplicateEntityDeclaration(sym, previous) => {
                (&sym).invalid(text).info(&previous, "previous declaration")
            }
            EntityError::UnknownEntity(sym)
            | EntityError::UnknownType(sym)
            | EntityError::MissingTypeDeclaration(sym) => (&sym).invalid(text),
        }
    }
}

/// Constraints under which an entity is a valid assignment: each referenced
/// parameter must itself take one of the allowed entities.
pub type ParamConstraints = BTreeMap<Param, BTreeSet<Entity>>;
pub type EntitiesWithParamConstraints = BTreeMap<Entity, ParamConstraints>;
/// Result of unification: for each parameter, the candidate entities and the
/// cross-parameter constraints each candidate carries.
pub type ParameterValuesWithConstraints = BTreeMap<Param, EntitiesWithParamConstraints>;

/// Enumerates all concrete assignments consistent with the candidate map and
/// its constraints, in lexicographic parameter order.
pub fn unfold_map_with_set(map: &ParameterValuesWithConstraints) -> Vec<BTreeMap<Param, Entity>> {
    fn admissible(
        chosen: &BTreeMap<Param, Entity>,
        chosen_constraints: &[(&Param, &ParamConstraints)],
        param: &Param,
        entity: &Entity,
        constraints: &ParamConstraints,
    ) -> bool {
        // constraints recorded by earlier choices may restrict this parameter
        for (_, earlier) in chosen_constraints {
            if let Some(allowed) = earlier.get(param) {
                if !allowed.contains(entity) {
                    return false;
                }
            }
        }
        // constraints of this candidate may refer back to already-bound parameters
        for (other, allowed) in constraints {
            if let Some(bound) = chosen.get(other) {
                if !allowed.contains(bound) {
                    return false;
                }
            }
        }
        true
    }

    fn unfold<'a>(
        remaining: &[(&'a Param, &'a EntitiesWithParamConstraints)],
        chosen: &mut BTreeMap<Param, Entity>,
        chosen_constraints: &mut Vec<(&'a Param, &'a ParamConstraints)>,
        out: &mut Vec<BTreeMap<Param, Entity>>,
    ) {
        match remaining.split_first() {
            None => {
                if !chosen.is_empty() {
                    out.push(chosen.clone());
                }
            }
            Some((&(param, candidates), rest)) => {
                for (entity, constraints) in candidates.iter() {
                    if !admissible(chosen, chosen_constraints, param, entity, constraints) {
                        continue;
                    }
                    chosen.insert(param.clone(), entity.clone());
                    chosen_constraints.push((param, constraints));
                    unfold(rest, chosen, chosen_constraints, out);
                    chosen_constraints.pop();
                    chosen.remove(param);
                }
            }
        }
    }

    let entries: Vec<_> = map.iter().collect();
    let mut out = Vec::new();
    unfold(&entries, &mut BTreeMap::new(), &mut Vec::new(), &mut out);
    out
}

/// The declared objects of a problem (or the constants of a domain), indexed
/// by value and by type name.
#[derive(Clone, Default)]
pub struct SetOfEntities {
    value_to_entity: BTreeMap<Sym, Entity>,
    type_name_to_entities: hashbrown::HashMap<String, EntitiesWithParamConstraints>,
}

impl SetOfEntities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `e1 e2 e3 - type` declarations, one per line.
    pub fn from_pddl(s: &str, types: &SetOfTypes) -> Result<Self, EntityError> {
        let mut res = Self::new();
        res.add_all_from_pddl(s, types)?;
        Ok(res)
    }

    pub fn add_all_from_pddl(&mut self, s: &str, types: &SetOfTypes) -> Result<(), EntityError> {
        for line in s.lines() {
            let line = line.split(';').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let (names, tpe) = match line.split_once('-') {
                Some((names, tpe)) => (names, Some(tpe.trim())),
                None => (line, None),
            };
            let tpe = match tpe {
                Some(name) => Some(
                    types
                        .name_to_type(name)
                        .map_err(|_| EntityError::UnknownType(Sym::from(name)))?,
                ),
                None if types.is_empty() => None,
                None => return Err(EntityError::MissingTypeDeclaration(Sym::from(line))),
            };
            for name in names.split_whitespace() {
                self.add(Entity::new(name, tpe.clone()));
            }
        }
        Ok(())
    }

    pub fn add(&mut self, entity: Entity) {
        if let Some(tpe) = &entity.tpe {
            self.type_name_to_entities
                .entry(tpe.name().canonical_string())
                .or_default()
                .insert(entity.clone(), ParamConstraints::new());
        }
        self.value_to_entity.insert(entity.value.clone(), entity);
    }

    pub fn add_all_if_not_exist(&mut self, other: &SetOfEntities) {
        for entity in other.iter() {
            if self.value_to_entity(entity.value.canonical_str()).is_none() {
                self.add(entity.clone());
            }
        }
    }

    pub fn remove(&mut self, entity: &Entity) {
        self.value_to_entity.remove(&entity.value);
        if let Some(tpe) = &entity.tpe {
            if let Some(entities) = self.type_name_to_entities.get_mut(tpe.name().canonical_str()) {
                entities.remove(entity);
                if entities.is_empty() {
                    self.type_name_to_entities.remove(tpe.name().canonical_str());
                }
            }
        }
    }

    pub fn value_to_entity(&self, value: &str) -> Option<&Entity> {
        self.value_to_entity.get(value)
    }

    pub fn type_name_to_entities(&self, type_name: &str) -> Option<&EntitiesWithParamConstraints> {
        self.type_name_to_entities.get(type_name)
    }

    /// All entities whose type is (a subtype of) the given one; untyped
    /// entities match an untyped request only.
    pub fn entities_of_type(&self, tpe: Option<&Type>) -> Vec<&Entity> {
        self.value_to_entity
            .values()
            .filter(|e| match (tpe, &e.tpe) {
                (None, _) => true,
                (Some(requested), Some(actual)) => actual.is_a(requested),
                (Some(_), None) => false,
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.value_to_entity.values()
    }

    pub fn is_empty(&self) -> bool {
        self.value_to_entity.is_empty()
    }

    /// Renders `e1 e2 - type` lines grouped by type, in type-name order.
    pub fn to_pddl(&self) -> String {
        let mut type_to_values: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for entity in self.value_to_entity.values() {
            let type_name = entity.tpe.as_ref().map(|t| t.name().canonical_string()).unwrap_or_default();
            type_to_values.entry(type_name).or_default().push(entity.value.canonical_str());
        }
        let mut lines = Vec::new();
        for (type_name, values) in type_to_values {
            if type_name.is_empty() {
                lines.push(values.join(" "));
            } else {
                lines.push(format!("{} - {}", values.join(" "), type_name));
            }
        }
        lines.join("\n")
    }
}

impl Debug for SetOfEntities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SetOfEntities({})", self.value_to_entity.keys().map(|k| k.canonical_str()).collect::<Vec<_>>().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str) -> Param {
        Param::new(name, None)
    }
    fn entity(name: &str) -> Entity {
        Entity::new(name, None)
    }

    fn unfolded(input: &[(&str, &[&str])]) -> String {
        let mut map = ParameterValuesWithConstraints::new();
        for (p, entities) in input {
            let slot = map.entry(param(p)).or_default();
            for e in *entities {
                slot.insert(entity(e), ParamConstraints::new());
            }
        }
        unfold_map_with_set(&map)
            .iter()
            .map(|assignment| {
                let inner = assignment
                    .iter()
                    .map(|(p, e)| format!("{p} -> {e}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({inner})")
            })
            .collect::<String>()
    }

    #[test]
    fn unfold() {
        assert_eq!("", unfolded(&[]));
        assert_eq!("(a -> b)", unfolded(&[("a", &["b"])]));
        assert_eq!("(a -> b)(a -> c)", unfolded(&[("a", &["b", "c"])]));
        assert_eq!("(a -> b, d -> e)", unfolded(&[("a", &["b"]), ("d", &["e"])]));
        assert_eq!(
            "(a -> b, d -> e)(a -> c, d -> e)",
            unfolded(&[("a", &["b", "c"]), ("d", &["e"])])
        );
        assert_eq!(
            "(a -> b, d -> e)(a -> b, d -> f)(a -> c, d -> e)(a -> c, d -> f)",
            unfolded(&[("a", &["b", "c"]), ("d", &["e", "f"])])
        );
    }

    #[test]
    fn unfold_with_constraints() {
        // ?a -> b is only valid when ?d -> e
        let mut map = ParameterValuesWithConstraints::new();
        let mut b_constraints = ParamConstraints::new();
        b_constraints.insert(param("?d"), BTreeSet::from([entity("e")]));
        map.entry(param("?a")).or_default().insert(entity("b"), b_constraints);
        map.entry(param("?a")).or_default().insert(entity("c"), ParamConstraints::new());
        map.entry(param("?d")).or_default().insert(entity("e"), ParamConstraints::new());
        map.entry(param("?d")).or_default().insert(entity("f"), ParamConstraints::new());

        let assignments = unfold_map_with_set(&map);
        let rendered: Vec<String> = assignments
            .iter()
            .map(|a| a.iter().map(|(p, e)| format!("{p}={e}")).collect::<Vec<_>>().join(","))
            .collect();
        assert_eq!(rendered, vec!["?a=b,?d=e", "?a=c,?d=e", "?a=c,?d=f"]);
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_number("32"), Some(RealValue::new(32, 1)));
        assert_eq!(parse_number("-3"), Some(RealValue::new(-3, 1)));
        assert_eq!(parse_number("3.14"), Some(RealValue::new(314, 100)));
        assert_eq!(parse_number("-323.3"), Some(RealValue::new(-3233, 10)));
        assert_eq!(parse_number("toto"), None);
    }
}
