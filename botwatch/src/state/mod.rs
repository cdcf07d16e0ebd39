pub mod series;
pub mod window;
