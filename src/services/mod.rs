pub mod daraja_service;
