pub mod error;
pub mod handlers;
pub mod models;
mod server;
pub mod state;

pub use server::{build_router, run};
