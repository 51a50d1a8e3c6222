mod app_router;
pub mod digest;

pub use app_router::AppRouter;
