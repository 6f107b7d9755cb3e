pub mod account;
pub mod avatar;
pub mod sign_in;
