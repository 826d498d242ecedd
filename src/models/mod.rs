pub mod user;
pub mod seat;
pub mod reservation;
pub mod event;

pub use user::User;
pub use seat::{Seat, SeatStatus};
pub use reservation::{NewReservation, Reservation, ReservationStatus};
pub use event::ReservationCreated;
