pub mod cover_letter;
pub mod cv;

pub use cover_letter::CoverLetter;
pub use cv::Cv;
