pub mod audio;
pub mod manager;
pub mod queue;

#[cfg(test)]
pub(crate) mod testing;
