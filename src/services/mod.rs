pub mod forecasting;
pub mod ticket_source;

pub use forecasting::{
    Clock, FixedClock, ForecastRefresher, ForecastService, ForecastSnapshot, RefreshFailure,
    RefreshHandle, SystemClock,
};
pub use ticket_source::{HttpTicketSource, InMemoryTicketSource, TicketSource};
