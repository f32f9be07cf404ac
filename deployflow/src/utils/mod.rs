//! Small shared helpers: parameter validation and URL joining.

mod urls;
mod validation;

pub use urls::join_url;
pub use validation::{valid_service_name, SERVICE_NAME_MAX_LEN};
