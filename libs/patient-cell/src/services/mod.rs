pub mod patient;
pub mod pre_registration;
pub mod reports;
