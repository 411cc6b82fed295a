use std::fmt::Debug;

use derive_more::derive::Display;

use crate::{Entity, Sym, Type, TypeError, types::SetOfTypes};

/// A lifted slot of an action, event or quantifier. The name conventionally
/// begins with `?`; two parameters within one scope are unique by name.
#[derive(Clone, Display)]
#[display("{name}")]
pub struct Param {
    pub name: Sym,
    pub tpe: Option<Type>,
}

impl PartialOrd for Param {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Param {
    // Two parameters cannot have the same name within a scope.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name().cmp(other.name())
    }
}
impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Param {}

impl Debug for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tpe {
            Some(tpe) => write!(f, "{} - {}", self.name, tpe),
            None => write!(f, "{}", self.name),
        }
    }
}

impl Param {
    pub fn new(name: impl Into<Sym>, tpe: Option<Type>) -> Self {
        Self { name: name.into(), tpe }
    }

    /// Parses a `?name - type` declaration.
    pub fn from_str(s: &str, types: &SetOfTypes) -> Result<Param, TypeError> {
        match s.split_once('-') {
            Some((name, tpe)) => {
                let tpe = types.name_to_type(tpe.trim())?;
                Ok(Param::new(name.trim(), Some(tpe)))
            }
            None => {
                let name = s.trim();
                if types.is_empty() {
                    Ok(Param::new(name, None))
                } else {
                    Err(TypeError::MissingType(Sym::from(name)))
                }
            }
        }
    }

    /// A parameter standing for any value of the given type, named after it.
    pub fn from_type(tpe: Type) -> Param {
        Param::new(format!("?{}", tpe.name()), Some(tpe))
    }

    pub fn name(&self) -> &Sym {
        &self.name
    }
    pub fn tpe(&self) -> Option<&Type> {
        self.tpe.as_ref()
    }

    pub fn to_entity(&self) -> Entity {
        Entity::new(self.name.clone(), self.tpe.clone())
    }

    pub fn to_pddl(&self) -> String {
        match &self.tpe {
            Some(tpe) => format!("{} - {}", self.name, tpe),
            None => self.name.canonical_string(),
        }
    }
}
