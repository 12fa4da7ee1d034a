pub mod location;
pub mod place;
pub mod traffic;
