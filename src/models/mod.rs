// Domain models shared by the buffer, aggregator, reconciler and HTTP layer

mod aggregation;
mod frame;
mod sample;
mod view;

pub use aggregation::AggregateRecord;
pub use frame::{ChartFrame, HistoryFrame};
pub use sample::{Sample, SensorReading};
pub use view::DashboardView;
