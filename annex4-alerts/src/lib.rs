pub mod emitter;

pub use emitter::{priority_str, AlertBus, AlertEmitter, ChannelAlertBus, SOURCE_TAG};
