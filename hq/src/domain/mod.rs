//! Domain types shared by the queue and its callers

mod priority;

pub use priority::Priority;
