pub mod errors;
pub mod db;
pub mod login;
pub mod user;
pub mod user_log;
pub mod user_profile;

#[cfg(test)]
mod tests;
