pub mod actor;
pub mod audit;
pub mod request_id;

pub use actor::*;
pub use audit::*;
pub use request_id::*;
