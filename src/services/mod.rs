pub mod fan_out;
pub mod fetcher;
pub mod processor;
pub mod queue;
pub mod search;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;
