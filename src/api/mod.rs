// API module
//
// HTTP surface for the ledger, wallet creation and peer replication

pub mod handlers;
pub mod routes;
pub mod schema;

// Re-export main components for easier access
pub use routes::configure_routes;
