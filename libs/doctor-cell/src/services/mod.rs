pub mod doctor;
pub mod specialties;
