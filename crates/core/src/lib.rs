pub mod annotation;
pub mod capture;
pub mod classification;
pub mod detection;
pub mod emotion;
pub mod history;
pub mod pipeline;
pub mod shared;
