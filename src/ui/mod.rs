mod output;

pub use output::{
    display_error, display_report, display_review_items, display_run_summary, display_tool_calls,
};
