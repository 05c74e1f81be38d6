pub mod interaction_limit;
pub mod show_banners;
pub mod start_banner;
pub mod stop_banner;

pub use interaction_limit::{
    BannerStopper, InteractionLimitOperation, InteractionOutcome, LimitNotifier, LimitState,
};
pub use show_banners::{ShowBannersOperation, ShowBannersOperationRequest};
pub use start_banner::{StartBannerOperation, StartBannerOperationResult};
pub use stop_banner::StopBannerOperation;
