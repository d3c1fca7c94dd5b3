pub mod analysis;
pub mod extraction;
pub mod intent;
pub mod visualization;
