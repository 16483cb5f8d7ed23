pub mod debug_traces;
pub mod error_records;
pub mod usage_records;

pub use debug_traces::Entity as DebugTraces;
pub use error_records::Entity as ErrorRecords;
pub use usage_records::Entity as UsageRecords;
