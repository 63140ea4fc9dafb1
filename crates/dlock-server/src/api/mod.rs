pub mod dlock;
pub mod route;
