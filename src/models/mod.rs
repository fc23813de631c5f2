pub mod mpesa_entries;
