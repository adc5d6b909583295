pub mod access_token;
pub mod token_cache;
pub mod token_class;
