/*!
 * # Machine Learning Module
 *
 * Statistical models used by the CRM backend. Currently this is the
 * ticket-volume forecaster: daily aggregation of ticket creation dates and a
 * least-squares polynomial projection of the coming days.
 */

/// Ticket-volume forecasting
pub mod forecasting;
