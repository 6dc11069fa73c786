mod progress_style;
mod timing;

pub use progress_style::ProgressStyleTemplate;
pub use timing::timed;
