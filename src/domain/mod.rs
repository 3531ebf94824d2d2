pub mod entry;
pub mod feed;
pub mod subscription;

pub use entry::{format_timestamp, parse_timestamp, Entry};
pub use feed::Feed;
pub use subscription::{Category, CategoryPath, Outline, OutlineRef, Subscription, SubscriptionList};
