mod actions;
mod callbacks;
mod conditions;
mod domain;
mod effects;
mod entities;
pub mod errors;
mod facts;
mod goals;
mod matching;
mod params;
pub mod pddl;
mod predicates;
mod problem;
mod sym;
mod types;
pub(crate) mod utils;
mod world;

pub use actions::*;
pub use callbacks::*;
pub use conditions::*;
pub use domain::*;
pub use effects::*;
pub use entities::*;
pub use facts::*;
pub use goals::*;
pub use matching::*;
pub use params::*;
pub use predicates::*;
pub use problem::*;
pub use sym::*;
pub use types::*;
pub use world::*;

pub use errors::{Message, Res};
