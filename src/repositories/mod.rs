pub mod booking_repository;
pub mod chat_repository;
pub mod payment_repository;
pub mod review_repository;
pub mod service_repository;
pub mod transaction_repository;
pub mod user_repository;
pub mod withdrawal_repository;

pub use booking_repository::{BookingFilter, BookingRepository};
pub use chat_repository::ChatRepository;
pub use payment_repository::PaymentRepository;
pub use review_repository::ReviewRepository;
pub use service_repository::ServiceRepository;
pub use transaction_repository::TransactionRepository;
pub use user_repository::UserRepository;
pub use withdrawal_repository::WithdrawalRepository;
