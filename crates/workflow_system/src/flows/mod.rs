//! Product workflows built on the step controller.

pub mod shahid;
pub mod video_book;
