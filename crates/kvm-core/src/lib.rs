use error::KvmError;

pub mod constants;
pub mod error;
pub mod fetch;
pub mod index;
pub mod registry;
pub mod release;
pub mod store;
pub mod version;

#[cfg(test)]
pub(crate) mod test_utils;

pub type KvmResult<T> = std::result::Result<T, KvmError>;
