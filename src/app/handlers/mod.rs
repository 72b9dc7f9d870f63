pub mod callback;
pub mod dashboard;
pub mod health;
pub mod home;
pub mod login;
pub mod logout;
