// Ticket store records consumed by the forecasting engine
pub mod ticket;

pub use ticket::{decode_ticket_batch, TicketRecord};
