pub mod cheap;
pub mod expensive;
