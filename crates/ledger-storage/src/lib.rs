pub mod json_store;

pub use json_store::{load_chain, save_chain, JsonFileStore};
