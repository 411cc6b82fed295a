pub mod convert;
pub mod find_file;
pub mod input;
pub mod parser;
pub mod printer;
pub mod sexpr;

pub use convert::*;
pub use find_file::find_domain_of;
pub use parser::*;
pub use printer::*;
pub use sexpr::{SAtom, SExpr, SList};
