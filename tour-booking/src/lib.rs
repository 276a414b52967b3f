pub mod dispatcher;
pub mod engine;
pub mod finance;
pub mod memory;
pub mod models;
pub mod repository;

pub use dispatcher::{spawn_notification_worker, NotificationQueue};
pub use engine::BookingEngine;
pub use finance::OrganizerDashboard;
pub use memory::InMemoryBookingStore;
pub use models::Subscription;
pub use repository::{BookingStore, Enrollment, SubscriptionStats};
