pub mod extract;
pub mod handlers;
pub mod server;
pub mod state;

pub use extract::{extract_reply, ExtractionPolicy, Reply};
pub use server::{build_router, run_server};
pub use state::{AppState, ChatSettings};
