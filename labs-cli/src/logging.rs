//! Cấu hình log cho binary `labs`.
//!
//! - Lọc theo `RUST_LOG`, mặc định mức INFO cho các crate `labs_*`.
//! - Xuất JSON khi `RUST_LOG_FORMAT=json`.
//! - Log ghi ra stderr để stdout chỉ chứa kết quả.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "labs=info,labs_extract=info,labs_store=info";

/// Gọi một lần khi khởi động; các lần gọi sau không có tác dụng.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let is_json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if is_json {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_does_not_panic() {
        init();
        init();
    }

    #[test]
    fn default_filter_parses() {
        let filter = EnvFilter::new(DEFAULT_FILTER);
        assert!(format!("{filter:?}").contains("labs_store"));
    }
}
