pub mod grafana;

pub use grafana::{AlertBatch, AlertEvent, AlertStatus, Timestamp};
