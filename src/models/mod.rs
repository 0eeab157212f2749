// Domain models: fleet inventory, series points, metrics-store wire format

mod inventory;
mod prom;
mod series;

pub use inventory::{Entity, EntityState, FleetUpdate, Service, labels_display, truncate_id};
pub use prom::{InstantSample, QueryData, QueryResponse, RangeSample};
pub use series::SeriesPoint;
