pub mod console;
#[cfg(feature = "desktop")]
pub mod desktop;
pub mod inference;
pub mod intake;
pub mod params;
pub mod results;
