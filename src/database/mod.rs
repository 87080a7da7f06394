pub mod pg_store;
pub mod pool;
pub mod store;

#[cfg(test)]
pub(crate) mod memory;
