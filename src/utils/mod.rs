mod maths_utils;
mod time_utils;

pub use maths_utils::mean_and_stddev;
pub use time_utils::{epoch_ms_to_utc, format_duration};
