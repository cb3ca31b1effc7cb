pub mod landing;
pub mod responses;
pub mod router;
pub mod state;
pub mod storage;
pub mod uploads;

pub use responses::{ApiMessage, internal_error, json_error};
pub use state::AppState;
pub use uploads::{ensure_directory, process_publish_form};
