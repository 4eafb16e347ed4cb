pub mod rolling_history;
pub mod shared_history;
pub mod statistics_aggregator;
