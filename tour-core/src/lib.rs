pub mod error;
pub mod identity;
pub mod notification;
pub mod payment;

pub use error::{BookingError, BookingResult, BusinessRuleViolation};
pub use identity::{Actor, Role};
pub use notification::{LogNotificationSink, NotificationSink};
pub use payment::{PaymentMethod, PaymentStatus};
