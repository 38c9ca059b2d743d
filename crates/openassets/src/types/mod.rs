//! Holds Bitcoin value types (scripts, inputs, outputs, transactions) and
//! the Open Assets colored output value object.

pub mod colored;
pub mod script;
pub mod tx;
pub mod txin;
pub mod txout;

pub use colored::*;
pub use script::*;
pub use tx::*;
pub use txin::*;
pub use txout::*;
