pub mod response;
pub mod tenant;

pub use response::{ApiResponse, ApiResult};
pub use tenant::resolve_tenant_middleware;
