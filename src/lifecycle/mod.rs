pub mod state;
pub mod rules;
pub mod permissions;
pub mod transitions;
pub mod npdi;
pub mod views;

pub use state::*;
pub use rules::*;
pub use permissions::*;
pub use transitions::*;
pub use npdi::*;
pub use views::*;
