use crate::errors::{Spanned, ToMessage};
use crate::{Message, Sym};
use std::fmt::{Debug, Display};
use std::sync::{Arc, LazyLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TypeError {
    #[error("`{0}` is not a declared type")]
    UnknownType(Sym),
    #[error("types `{0}` and `{1}` are not comparable")]
    IncomparableTypes(Sym, Sym),
    #[error("entities of kind `{0}` must declare a type")]
    MissingType(Sym),
}

impl ToMessage for TypeError {
    fn to_message(self) -> Message {
        let text = self.to_string();
        match self {
            TypeError::UnknownType(sym) | TypeError::MissingType(sym) => (&sym).invalid(text),
            TypeError::IncomparableTypes(a, b) => (&a).invalid(text).info(&b, "other type"),
        }
    }
}

static NUMBER_TYPE: LazyLock<Type> = LazyLock::new(|| {
    Type(Arc::new(TypeNode {
        name: Sym::from(Type::NUMBER_TYPE_NAME),
        parent: None,
    }))
});

struct TypeNode {
    name: Sym,
    parent: Option<Type>,
}

/// A node of the type lattice. Cheap to clone; identity is the type name.
#[derive(Clone)]
pub struct Type(Arc<TypeNode>);

impl Type {
    pub const NUMBER_TYPE_NAME: &'static str = "number";

    /// The built-in type of numeric fluent values, present in every type set.
    pub fn number() -> Type {
        NUMBER_TYPE.clone()
    }

    pub fn name(&self) -> &Sym {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&Type> {
        self.0.parent.as_ref()
    }

    /// Returns true if this type is `other` or a transitive subtype of it.
    pub fn is_a(&self, other: &Type) -> bool {
        if self.name() == other.name() {
            return true;
        }
        match self.parent() {
            Some(parent) => parent.is_a(other),
            None => false,
        }
    }

    /// All strict ancestors, nearest first.
    pub fn ancestors(&self) -> Vec<Type> {
        let mut res = Vec::new();
        let mut current = self.parent().cloned();
        while let Some(t) = current {
            current = t.parent().cloned();
            res.push(t);
        }
        res
    }

    /// Returns whichever of the two types is a subtype of the other.
    pub fn smaller(t1: Option<&Type>, t2: Option<&Type>) -> Result<Option<Type>, TypeError> {
        match (t1, t2) {
            (None, t2) => Ok(t2.cloned()),
            (t1, None) => Ok(t1.cloned()),
            (Some(t1), Some(t2)) => {
                if t1.is_a(t2) {
                    Ok(Some(t1.clone()))
                } else if t2.is_a(t1) {
                    Ok(Some(t2.clone()))
                } else {
                    Err(TypeError::IncomparableTypes(t1.name().clone(), t2.name().clone()))
                }
            }
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}
impl Eq for Type {}
impl PartialOrd for Type {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Type {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name().cmp(other.name())
    }
}
impl std::hash::Hash for Type {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name().hash(state)
    }
}
impl Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The single-inheritance type tree of a domain.
///
/// The built-in `number` type is always present.
#[derive(Clone)]
pub struct SetOfTypes {
    /// User types in declaration order (for printing).
    all: Vec<Type>,
    name_to_type: hashbrown::HashMap<String, Type>,
    /// Direct subtypes of each type.
    children: hashbrown::HashMap<String, Vec<Type>>,
}

impl Default for SetOfTypes {
    fn default() -> Self {
        Self::new()
    }
}

impl SetOfTypes {
    pub fn new() -> Self {
        let mut name_to_type = hashbrown::HashMap::new();
        name_to_type.insert(Type::NUMBER_TYPE_NAME.to_string(), Type::number());
        Self {
            all: Vec::new(),
            name_to_type,
            children: Default::default(),
        }
    }

    /// Parses `child1 child2 - parent` declarations, one per line.
    /// `;` starts a comment that runs to the end of the line.
    pub fn from_pddl(s: &str) -> Result<Self, TypeError> {
        let mut res = Self::new();
        res.add_types_from_pddl(s)?;
        Ok(res)
    }

    pub fn add_types_from_pddl(&mut self, s: &str) -> Result<(), TypeError> {
        for line in s.lines() {
            let line = line.split(';').next().unwrap_or("");
            let (names, parent) = match line.split_once('-') {
                Some((names, parent)) => (names, Some(parent.trim())),
                None => (line, None),
            };
            for name in names.split_whitespace() {
                self.add_type(name, parent.filter(|p| !p.is_empty()));
            }
        }
        Ok(())
    }

    /// Declares a type. A yet-unknown parent is created on the fly.
    pub fn add_type(&mut self, name: impl Into<Sym>, parent: Option<impl Into<Sym>>) {
        let name = name.into();
        let parent = match parent {
            Some(parent) => {
                let parent = parent.into();
                if !self.name_to_type.contains_key(parent.canonical_str()) {
                    self.add_type(parent.clone(), None::<Sym>);
                }
                Some(self.name_to_type[parent.canonical_str()].clone())
            }
            None => None,
        };
        if self.name_to_type.contains_key(name.canonical_str()) {
            return;
        }
        let tpe = Type(Arc::new(TypeNode {
            name: name.clone(),
            parent: parent.clone(),
        }));
        if let Some(parent) = parent {
            self.children
                .entry(parent.name().canonical_string())
                .or_default()
                .push(tpe.clone());
        }
        self.all.push(tpe.clone());
        self.name_to_type.insert(name.canonical_string(), tpe);
    }

    pub fn name_to_type(&self, name: impl Into<Sym>) -> Result<Type, TypeError> {
        let name = name.into();
        self.name_to_type
            .get(name.canonical_str())
            .cloned()
            .ok_or(TypeError::UnknownType(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_to_type.contains_key(name)
    }

    /// All strict descendants of the given type.
    pub fn descendants(&self, tpe: &Type) -> Vec<Type> {
        let mut res = Vec::new();
        let mut queue = vec![tpe.clone()];
        while let Some(current) = queue.pop() {
            if let Some(children) = self.children.get(current.name().canonical_str()) {
                for child in children {
                    res.push(child.clone());
                    queue.push(child.clone());
                }
            }
        }
        res
    }

    /// True when no user type was declared (`number` does not count).
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Type> + '_ {
        self.all.iter()
    }

    /// Renders the `:types` declarations, one `children - parent` line per parent.
    pub fn to_pddl(&self) -> String {
        let mut lines = Vec::new();
        for tpe in &self.all {
            let children = self.children.get(tpe.name().canonical_str());
            match children {
                Some(children) if !children.is_empty() => {
                    let children = children.iter().map(|c| c.name().canonical_str()).collect::<Vec<_>>();
                    lines.push(format!("{} - {}", children.join(" "), tpe.name()));
                }
                _ => {
                    if tpe.parent().is_none() {
                        lines.push(tpe.name().canonical_string());
                    }
                }
            }
        }
        lines.join("\n")
    }
}

impl Debug for SetOfTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SetOfTypes({})", self.all.iter().map(|t| t.name().canonical_str()).collect::<Vec<_>>().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtyping() {
        let types = SetOfTypes::from_pddl("my_type my_type2 my_type3 - entity\nsub_my_type3 - my_type3").unwrap();
        let entity = types.name_to_type("entity").unwrap();
        let my_type3 = types.name_to_type("my_type3").unwrap();
        let sub = types.name_to_type("sub_my_type3").unwrap();

        assert!(sub.is_a(&my_type3));
        assert!(sub.is_a(&entity));
        assert!(sub.is_a(&sub));
        assert!(!my_type3.is_a(&sub));
        assert!(types.name_to_type("unknown").is_err());

        let ancestors: Vec<_> = sub.ancestors().iter().map(|t| t.name().canonical_string()).collect();
        assert_eq!(ancestors, vec!["my_type3", "entity"]);
        let mut descendants: Vec<_> = types.descendants(&entity).iter().map(|t| t.name().canonical_string()).collect();
        descendants.sort();
        assert_eq!(descendants, vec!["my_type", "my_type2", "my_type3", "sub_my_type3"]);
    }

    #[test]
    fn smaller_type() {
        let types = SetOfTypes::from_pddl("a b - top\nsub_a - a").unwrap();
        let a = types.name_to_type("a").unwrap();
        let b = types.name_to_type("b").unwrap();
        let sub_a = types.name_to_type("sub_a").unwrap();

        assert_eq!(Type::smaller(Some(&a), Some(&sub_a)).unwrap(), Some(sub_a.clone()));
        assert_eq!(Type::smaller(None, Some(&b)).unwrap(), Some(b.clone()));
        assert!(Type::smaller(Some(&a), Some(&b)).is_err());
    }

    #[test]
    fn number_is_builtin() {
        let types = SetOfTypes::new();
        assert!(types.is_empty());
        assert!(types.name_to_type("number").is_ok());
    }
}
