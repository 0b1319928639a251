// Business domains
pub mod pairing;
