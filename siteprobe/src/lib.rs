pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    build_config, output_format, parse_root_url, print_banner, render_report, write_report,
};
