pub mod manager;
pub mod memory;
pub mod postgres;
pub mod procedure;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryProcedureExecutor;
pub use postgres::PgProcedureExecutor;
pub use procedure::{ExpectedReturn, ProcedureExecutor, ProcedureOutput, ProcedureParams, Row, SqlValue};
