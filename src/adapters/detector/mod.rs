pub mod mock;
pub mod remote;

pub use mock::MockDetector;
pub use remote::RemoteDetector;
