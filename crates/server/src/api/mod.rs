pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod scheduler;
pub mod sources;
pub mod torrents;

pub use routes::create_router;
