pub mod referer;
pub mod timing;

pub use referer::RefererGuard;
pub use timing::TimingMiddleware;
