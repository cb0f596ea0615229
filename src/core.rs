pub mod acquirer;
pub mod connectivity;
pub mod session;
pub mod translation;
pub mod upload;
