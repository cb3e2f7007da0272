pub mod admin;
pub mod clock;
pub mod cooldown;
pub mod credentials;
pub mod device;
pub mod extractors;
pub mod guard;
pub mod jwt;
pub mod ledger;
pub mod password;
pub mod services;
pub mod sessions;
