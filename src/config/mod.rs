pub mod schema;

pub use schema::{
    BrowserConfig, OutputConfig, RoundTripConfig, SettleConfig, SettleStrategy, TargetConfig,
    Timeouts, Viewport, VerifyConfig,
};
