//! Repository implementations for the exchange record families

pub mod batches;
pub mod comms;
pub mod payer_cases;
pub mod requests;

pub use batches::BatchRepository;
pub use comms::CommRepository;
pub use payer_cases::PayerCaseRepository;
pub use requests::RequestRepository;
