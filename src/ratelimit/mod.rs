//! Rate limiting logic and state management.

mod clock;
mod counter;
mod decision;
mod key;
mod limiter;
mod policy;
mod schedule;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::CounterEntry;
pub use decision::Decision;
pub use key::CounterKey;
pub use limiter::RateLimiter;
pub use policy::{PolicyCatalog, RateLimitPolicy};
pub use schedule::{ManualScheduler, PeriodicTask, Scheduler, TaskHandle, TokioScheduler};
pub use store::{CounterStore, InMemoryCounterStore};
