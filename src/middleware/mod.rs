pub mod identity;
pub mod request_id;
pub mod tenant;

pub use identity::identity_middleware;
pub use request_id::{request_id_middleware, RequestId};
pub use tenant::{tenant_context_middleware, RequestContext, TenantResolver};
