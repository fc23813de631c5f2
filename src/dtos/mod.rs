pub mod callback_dtos;
pub mod mpesa_dtos;
