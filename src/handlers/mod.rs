pub mod b2c_handlers;
pub mod c2b_handlers;
pub mod mpesa_handlers;
