pub mod envelope;
pub mod response;

pub use envelope::{Envelope, ErrorBody};
pub use response::{ApiResponse, ApiResult};
