pub mod deal_card;
pub mod format;
pub mod home;
pub mod login;
