pub mod capacity;
pub mod excursion;
pub mod status;

pub use excursion::{Excursion, ExcursionDetails};
pub use status::ExcursionStatus;
