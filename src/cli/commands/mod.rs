pub mod import;
pub mod password;
