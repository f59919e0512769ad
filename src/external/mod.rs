pub mod clock;
pub mod groups;
pub mod packages;
pub mod users;

pub use clock::*;
pub use groups::*;
pub use packages::*;
pub use users::*;
