//! HTTP clients for the AI webhook and the transcription webhook.

pub mod client;
pub mod transcription;

#[cfg(test)]
pub(crate) mod test_server;
