pub mod failing;
pub mod http_json;
pub mod sample;
