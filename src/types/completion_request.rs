use serde::{Deserialize, Serialize};

/// Body of a `POST /completion` request to a llama.cpp-compatible server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// The fully formatted prompt.
    pub prompt: String,

    /// Whether the server should stream tokens as server-sent events.
    pub stream: bool,

    /// Maximum number of tokens to predict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_predict: Option<u32>,

    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Top-k sampling limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Nucleus sampling threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Strings that end generation when produced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl CompletionRequest {
    /// Create a streaming request for `prompt` with server-side sampling defaults.
    pub fn streaming(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            stream: true,
            n_predict: None,
            temperature: None,
            top_k: None,
            top_p: None,
            stop: Vec::new(),
        }
    }

    /// Set the maximum number of tokens to predict.
    pub fn with_n_predict(mut self, n_predict: Option<u32>) -> Self {
        self.n_predict = n_predict;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the top-k value.
    pub fn with_top_k(mut self, top_k: Option<u32>) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the top-p value.
    pub fn with_top_p(mut self, top_p: Option<f32>) -> Self {
        self.top_p = top_p;
        self
    }

    /// Set the stop strings.
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn request_minimal() {
        let request = CompletionRequest::streaming("### User:\nHi");
        let json = to_value(&request).unwrap();

        assert_eq!(
            json,
            json!({
                "prompt": "### User:\nHi",
                "stream": true
            })
        );
    }

    #[test]
    fn request_with_sampling() {
        let request = CompletionRequest::streaming("p")
            .with_n_predict(Some(64))
            .with_temperature(Some(0.5))
            .with_top_k(Some(40))
            .with_top_p(Some(0.75))
            .with_stop(vec!["### User:".to_string()]);
        let json = to_value(&request).unwrap();

        assert_eq!(
            json,
            json!({
                "prompt": "p",
                "stream": true,
                "n_predict": 64,
                "temperature": 0.5,
                "top_k": 40,
                "top_p": 0.75,
                "stop": ["### User:"]
            })
        );
    }
}
