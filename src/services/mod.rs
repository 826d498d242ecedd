pub mod events;
pub mod expiry;
pub mod ticketing;

pub use events::{ChannelEventPublisher, PublishError, RedisEventPublisher, ReservationEventPublisher};
pub use expiry::ReservationEventConsumer;
pub use ticketing::{PaymentCommand, PaymentReceipt, TicketingService};
