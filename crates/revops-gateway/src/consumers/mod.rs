//! Queue-consumer loops (C3/C4/C6 and C5) run by the gateway binary
//! alongside the HTTP ingress server.

pub mod delivery_consumer;
pub mod invoker_consumer;

pub use delivery_consumer::DeliveryConsumer;
pub use invoker_consumer::InvokerConsumer;
