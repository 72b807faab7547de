mod engine;
mod listener;
mod observer;
mod price_client;
mod price_store;
mod scheduler;
mod source;

pub use engine::{PollConfig, PollingEngine};
pub use listener::Listener;
pub use observer::{Observer, PriceSnapshot, Subject, SubscriberRegistry};
pub use price_client::MexcPriceClient;
pub use price_store::PriceStore;
pub use scheduler::{CronScheduler, ScheduleError, ScheduleHandle, ScheduledAction, Scheduler};
pub use source::{FetchError, PriceSource};
