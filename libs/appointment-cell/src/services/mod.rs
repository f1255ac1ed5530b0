pub mod booking;
pub mod lifecycle;
pub mod notification;
pub mod payment;
pub mod repository;
pub mod search;
pub mod slots;

pub use booking::BookingWorkflow;
pub use lifecycle::AppointmentLifecycle;
pub use notification::{LogNotifier, Notifier, SupabaseFunctionNotifier};
pub use payment::{PaymentGateway, RazorpayGateway};
pub use repository::AppointmentRepository;
pub use search::SearchEngine;
pub use slots::{available_dates, compute_slots, slots_on, SlotResolver};
