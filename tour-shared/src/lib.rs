pub mod audit;
pub mod models;
pub mod pii;

pub use audit::Timestamps;
pub use models::page::{Page, PageRequest};
pub use pii::Masked;
