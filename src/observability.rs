use biometrics::{Collector, Counter, Moments};

pub(crate) static ENGINE_LOADS: Counter = Counter::new("orca_chat.engine.loads");
pub(crate) static ENGINE_LOAD_ERRORS: Counter = Counter::new("orca_chat.engine.load_errors");
pub(crate) static ENGINE_REQUESTS: Counter = Counter::new("orca_chat.engine.requests");
pub(crate) static ENGINE_REQUEST_ERRORS: Counter =
    Counter::new("orca_chat.engine.request_errors");

pub(crate) static STREAM_TOKENS: Counter = Counter::new("orca_chat.stream.tokens");
pub(crate) static STREAM_BYTES: Counter = Counter::new("orca_chat.stream.bytes");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("orca_chat.stream.errors");
pub(crate) static STREAM_TTFT: Moments = Moments::new("orca_chat.stream.ttft_seconds");
pub(crate) static STREAM_DURATION: Moments = Moments::new("orca_chat.stream.duration_seconds");

pub(crate) static CHAT_SESSIONS: Counter = Counter::new("orca_chat.chat.sessions");
pub(crate) static CHAT_EXCHANGES: Counter = Counter::new("orca_chat.chat.exchanges");
pub(crate) static CHAT_EXCHANGE_ERRORS: Counter = Counter::new("orca_chat.chat.exchange_errors");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&ENGINE_LOADS);
    collector.register_counter(&ENGINE_LOAD_ERRORS);
    collector.register_counter(&ENGINE_REQUESTS);
    collector.register_counter(&ENGINE_REQUEST_ERRORS);

    collector.register_counter(&STREAM_TOKENS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_moments(&STREAM_TTFT);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&CHAT_SESSIONS);
    collector.register_counter(&CHAT_EXCHANGES);
    collector.register_counter(&CHAT_EXCHANGE_ERRORS);
}
