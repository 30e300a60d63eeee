//! Capacity- and latency-aware backend ordering ("C3"/"C4" in the design
//! overview): each backend is wrapped in a [`BalancedItem`] carrying its own
//! capacity monitor and latency samples, and a [`LoadBalancer`] keeps them
//! sorted best-first for the call dispatcher to consume.

mod balancer;
mod item;

pub use balancer::LoadBalancer;
pub use item::BalancedItem;
