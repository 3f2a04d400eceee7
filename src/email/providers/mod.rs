pub mod null;
pub mod smtp;
