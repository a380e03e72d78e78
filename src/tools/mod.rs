mod crm_tools;
mod mail_tools;
mod registry;

pub use crm_tools::crm_tools;
pub use mail_tools::mail_tools;
pub use registry::{error_payload, Tool, ToolHandler, ToolRegistry};
