use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use reqwest::header::{CONNECTION, REFERER, USER_AGENT};
use thiserror::Error;

use crate::config::CrawlerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("TLS error for {url}: {message}")]
    Tls { url: String, message: String },
    #[error("server responded {code} for {url}")]
    Status { url: String, code: u16 },
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub referer: Option<String>,
    pub timeout: Duration,
    pub verify_tls: bool,
}

impl FetchRequest {
    /// A listing page request: no referer, certificates verified.
    pub fn listing(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            referer: None,
            timeout,
            verify_tls: true,
        }
    }

    /// An album page or image request.
    ///
    /// The origin serves broken certificates, so verification is disabled.
    pub fn album_asset(url: impl Into<String>, album_url: &str, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            referer: Some(album_url.to_string()),
            timeout,
            verify_tls: false,
        }
    }
}

pub trait Fetcher: Clone + Send + Sync + 'static {
    /// Returns the body of a 2xx response.
    fn fetch(&self, request: FetchRequest)
        -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    verified: reqwest::Client,
    unverified: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> anyhow::Result<Self> {
        let verified = reqwest::ClientBuilder::new()
            .gzip(true)
            .deflate(true)
            .build()?;
        let unverified = reqwest::ClientBuilder::new()
            .gzip(true)
            .deflate(true)
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            verified,
            unverified,
            user_agent: config.user_agent.clone(),
        })
    }

    async fn get(self, request: FetchRequest) -> Result<Vec<u8>, FetchError> {
        let client = if request.verify_tls {
            &self.verified
        } else {
            &self.unverified
        };

        let mut builder = client
            .get(&request.url)
            .header(USER_AGENT, &self.user_agent)
            .header(CONNECTION, "keep-alive")
            .timeout(request.timeout);
        if let Some(referer) = &request.referer {
            builder = builder.header(REFERER, referer);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| classify(&request.url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: request.url,
                code: status.as_u16(),
            });
        }

        let body = resp.bytes().await.map_err(|e| classify(&request.url, e))?;
        Ok(body.to_vec())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        request: FetchRequest,
    ) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send {
        self.clone().get(request)
    }
}

fn classify(url: &str, err: reqwest::Error) -> FetchError {
    let err = err.without_url();
    let message = error_chain(&err);
    if err.is_connect() && tls_in_sources(&err) {
        FetchError::Tls {
            url: url.to_string(),
            message,
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            message,
        }
    }
}

/// reqwest does not expose TLS failures as a kind, they only show up in the source chain.
///
/// The top-level message is skipped, it may quote the request.
fn tls_in_sources(err: &(dyn StdError + 'static)) -> bool {
    let mut current = err.source();
    while let Some(e) = current {
        let msg = e.to_string().to_ascii_lowercase();
        if ["certificate", "tls", "ssl", "handshake"]
            .iter()
            .any(|needle| msg.contains(needle))
        {
            return true;
        }
        current = e.source();
    }
    false
}

/// Joins the source chain, leaving out sources already quoted by their parent.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut msg = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if !msg.contains(&text) {
            msg.push_str(": ");
            msg.push_str(&text);
        }
        current = e.source();
    }
    msg
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::{HashMap, VecDeque};
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    use super::{FetchError, FetchRequest, Fetcher};
    use crate::stop::StopSignal;

    type Reply = Result<Vec<u8>, FetchError>;

    #[derive(Default)]
    struct Script {
        routes: HashMap<String, VecDeque<Reply>>,
        stops: HashMap<String, StopSignal>,
        calls: Vec<FetchRequest>,
    }

    /// In-memory fetcher replaying canned replies per URL.
    ///
    /// Replies are consumed in order, the last one is repeated forever.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedFetcher {
        script: Arc<Mutex<Script>>,
    }

    impl ScriptedFetcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn reply(&self, url: &str, reply: Reply) -> &Self {
            self.script
                .lock()
                .unwrap()
                .routes
                .entry(url.to_string())
                .or_default()
                .push_back(reply);
            self
        }

        pub(crate) fn page(&self, url: &str, html: &str) -> &Self {
            self.reply(url, Ok(html.as_bytes().to_vec()))
        }

        /// Requests a stop while fetching `url`.
        pub(crate) fn stop_on(&self, url: &str, stop: &StopSignal) -> &Self {
            self.script
                .lock()
                .unwrap()
                .stops
                .insert(url.to_string(), stop.clone());
            self
        }

        pub(crate) fn calls(&self, url: &str) -> usize {
            self.script
                .lock()
                .unwrap()
                .calls
                .iter()
                .filter(|r| r.url == url)
                .count()
        }

        pub(crate) fn requests(&self) -> Vec<FetchRequest> {
            self.script.lock().unwrap().calls.clone()
        }

        fn next_reply(&self, request: FetchRequest) -> Reply {
            let mut script = self.script.lock().unwrap();
            if let Some(stop) = script.stops.get(&request.url) {
                stop.request_stop();
            }
            let url = request.url.clone();
            script.calls.push(request);
            match script.routes.get_mut(&url) {
                Some(replies) if replies.len() > 1 => replies.pop_front().unwrap(),
                Some(replies) => replies.front().cloned().unwrap(),
                None => Err(FetchError::Status { url, code: 404 }),
            }
        }
    }

    impl Fetcher for ScriptedFetcher {
        fn fetch(&self, request: FetchRequest) -> impl Future<Output = Reply> + Send {
            let reply = self.next_reply(request);
            async move { reply }
        }
    }

    pub(crate) fn transport(url: &str) -> FetchError {
        FetchError::Transport {
            url: url.to_string(),
            message: "connection reset by peer".into(),
        }
    }

    pub(crate) fn tls(url: &str) -> FetchError {
        FetchError::Tls {
            url: url.to_string(),
            message: "invalid peer certificate: Expired".into(),
        }
    }
}
