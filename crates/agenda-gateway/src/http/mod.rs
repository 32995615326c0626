pub mod contacts;
pub mod error;
pub mod events;
pub mod health;
pub mod jobs;

#[cfg(test)]
mod tests;
