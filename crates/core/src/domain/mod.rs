pub mod history;
pub mod lead;
pub mod user;
