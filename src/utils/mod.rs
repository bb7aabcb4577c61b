pub mod ip;

pub use ip::{is_valid_ip, require_ip, validate_optional_ip};
