pub mod booking_service;
pub mod catalog_service;
pub mod chat_service;
pub mod review_service;
pub mod wallet_service;
pub mod withdrawal_service;

pub use booking_service::{BookingService, CreateBooking};
pub use catalog_service::{CatalogService, CreateServiceListing};
pub use chat_service::ChatService;
pub use review_service::ReviewService;
pub use wallet_service::{TransferOutcome, WalletBalance, WalletService};
pub use withdrawal_service::{WithdrawalRequest, WithdrawalService};
