pub mod booking;
pub mod chat;
pub mod payment;
pub mod review;
pub mod service;
pub mod transaction;
pub mod user;
pub mod withdrawal;

pub use booking::{
    looks_like_time, Booking, BookingStatus, BookingUpdate, CancelParty, LedgerEffect,
    PaymentStatus, UpdatePlan,
};
pub use chat::{Chat, ChatMessage, SenderType};
pub use payment::Payment;
pub use review::{aggregate_ratings, is_valid_rating, RatingAggregate, Review};
pub use service::{validate_image_data_uri, validate_images, ServiceListing};
pub use transaction::{
    EntryAction, LedgerPurpose, TransactionMeta, TransactionStatus, TransactionType,
    WalletTransaction,
};
pub use user::{User, UserRole};
pub use withdrawal::{Withdrawal, WithdrawalStatus};
