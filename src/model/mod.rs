pub mod costume;
pub mod filters;
pub mod pen;
pub mod target;
