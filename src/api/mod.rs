pub mod classifier;
pub mod progress;
pub mod quiz;

pub use classifier::ClassifierClient;
pub use progress::ProgressClient;
pub use quiz::QuizClient;
