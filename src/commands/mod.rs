pub mod dashboard;
pub mod deals;
pub mod files;
pub mod login;
pub mod logout;
pub mod status;

/// Shown whenever a command lands on the login route.
pub const LOGIN_REQUIRED: &str = "Not logged in. Run 'dealdesk login' to sign in.";
