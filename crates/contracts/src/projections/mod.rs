pub mod p910_return_lifecycle;
