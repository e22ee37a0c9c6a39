pub mod evaluator;
pub mod location_updates;
pub mod reactor;
pub mod scheduler;
pub mod trigger;

#[cfg(test)]
pub mod testing;

pub use location_updates::{spawn_location_updates, LocationUpdateSettings};
pub use reactor::LocationChangeReactor;
pub use scheduler::{ReminderScheduler, Reschedule, SchedulerSettings};
