//! Flash-sale (seckill) core
//!
//! The reservation path: [`SeckillService::reserve`] runs the precondition
//! check and the atomic Redis admission, allocates the order id, and
//! publishes a reservation message. The durable pipeline
//! ([`consumer::spawn_consumers`]) materializes every admitted reservation
//! into an order row, retrying with backoff and escalating to a
//! dead-letter topic.

pub mod admission;
pub mod consumer;
pub mod id_worker;
pub mod pipeline;

pub use admission::SeckillService;
pub use consumer::spawn_consumers;
pub use id_worker::IdWorker;
pub use pipeline::{OrderPublisher, ReservationMessage};
