pub mod aggregator;
pub mod feed;
pub mod synth;

pub use aggregator::{AggregatorOptions, NotificationAggregator};
pub use feed::{FeedState, NotificationFeed, NotificationGroup, Section};
pub use synth::synthesize;
