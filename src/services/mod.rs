pub mod approval;
pub mod face;
pub mod jwt;
pub mod lifecycle;
pub mod notify;
pub mod otp;
pub mod password;
pub mod permissions;
