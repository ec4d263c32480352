pub mod common;
pub mod u601_return_lifecycle;
pub mod u602_receive_quantities;
