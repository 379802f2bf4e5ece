//! Utility functions for ids, timestamps, validation and bounded waits.

mod ids;
mod runtime;
pub mod timestamps;
pub mod validation;

pub use ids::generate_uuid_v7;
pub use runtime::{run_with_timeout, TimedResult};
pub use timestamps::{now_utc, Timestamp};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_v7_is_time_ordered_version() {
        let id = generate_uuid_v7();
        assert_eq!(id.get_version_num(), 7);
    }

    #[test]
    fn test_now_is_serialized_as_rfc3339() {
        let json = serde_json::to_string(&now_utc()).unwrap();
        assert!(json.contains('T'));
        assert!(json.ends_with("Z\""));
    }
}
