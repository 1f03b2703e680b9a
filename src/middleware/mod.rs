/// Middleware module
///
/// Request authentication for the protected user routes.

mod jwt_middleware;

pub use jwt_middleware::JwtMiddleware;
