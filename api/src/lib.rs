pub mod response;
pub mod routes;
pub mod scheduler;
pub mod state;
