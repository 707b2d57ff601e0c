use super::options::FetchOptions;
use super::Fetcher;
use crate::base::loadstate::LoadState;
use crate::base::neterror::FetchError;
use crate::http::orderedheaders::OrderedHeaderMap;
use crate::http::requestbody::Payload;
use crate::http::response::Response;
use crate::http::transaction::{HttpNetworkTransaction, PreparedRequest, RawResponse};
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Redirects followed so far by one logical fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectChain {
    hops: usize,
    limit: usize,
}

impl RedirectChain {
    pub fn new(limit: usize) -> Self {
        Self { hops: 0, limit }
    }

    pub fn hops(&self) -> usize {
        self.hops
    }

    /// Count one more hop, failing once the limit is already spent.
    pub fn follow(&mut self) -> Result<usize, FetchError> {
        if self.hops >= self.limit {
            return Err(FetchError::TooManyRedirects { limit: self.limit });
        }
        self.hops += 1;
        Ok(self.hops)
    }
}

/// One logical fetch: every exchange from the first request to the final
/// response, redirect hops included.
pub struct FetchJob<'a> {
    fetcher: &'a Fetcher,
    url: Url,
    method: Method,
    headers: OrderedHeaderMap,
    payload: Option<Payload>,
    timeout: Duration,
    ignore_errors: bool,
    chain: RedirectChain,
    state: LoadState,
}

impl<'a> FetchJob<'a> {
    /// `url` must already be resolved and carry its query.
    pub fn new(fetcher: &'a Fetcher, url: Url, options: FetchOptions) -> Result<Self, FetchError> {
        let FetchOptions {
            payload,
            headers,
            timeout,
            ignore_errors,
            ..
        } = options;
        let method = if payload.is_some() { Method::POST } else { Method::GET };

        Ok(Self {
            fetcher,
            url,
            method,
            headers: OrderedHeaderMap::from_pairs(headers)?,
            payload,
            timeout: timeout.unwrap_or(fetcher.config().timeout),
            ignore_errors,
            chain: RedirectChain::new(fetcher.config().redirect_limit),
            state: LoadState::Idle,
        })
    }

    pub fn load_state(&self) -> LoadState {
        self.state
    }

    pub fn redirects(&self) -> usize {
        self.chain.hops()
    }

    pub async fn run(&mut self) -> Result<Response, FetchError> {
        let result = self.run_loop().await;
        self.state = match &result {
            Ok(_) => LoadState::Done,
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "fetch failed");
                LoadState::Failed
            }
        };
        result
    }

    async fn run_loop(&mut self) -> Result<Response, FetchError> {
        loop {
            self.state = LoadState::Building;
            let mut request = self.build_request();
            self.fetcher.chain.run_request(&mut request)?;

            self.state = LoadState::Sending;
            let mut transaction = HttpNetworkTransaction::new(
                Arc::clone(&self.fetcher.factory),
                self.fetcher.config().keep_alive_timeout,
            );
            let raw = transaction.start(&request).await?;

            self.state = LoadState::Received;
            self.fetcher.chain.run_response(&request, &raw)?;

            let status = raw.status.as_u16();
            if (301..304).contains(&status) {
                self.state = LoadState::Redirecting;
                self.follow_redirect(&raw)?;
                continue;
            }
            if status > 300 && !self.ignore_errors {
                return Err(FetchError::HttpError { status: raw.status });
            }
            return Response::from_raw(raw, &self.fetcher.config().charset);
        }
    }

    /// Defaults, then per-call headers; the payload goes to the body encoder.
    fn build_request(&mut self) -> PreparedRequest {
        let mut request = PreparedRequest::new(self.method.clone(), self.url.clone(), self.timeout);
        request.headers = self.fetcher.default_headers.clone();
        request.headers.extend_from(&self.headers);
        request.payload = self.payload.take();
        request
    }

    /// Point the job at `Location` as a plain GET.
    fn follow_redirect(&mut self, raw: &RawResponse) -> Result<(), FetchError> {
        let hop = self.chain.follow()?;
        let location = raw.location().ok_or(FetchError::InvalidRedirect)?;
        let next = raw.url.join(location).map_err(|_| FetchError::InvalidRedirect)?;
        if !matches!(next.scheme(), "http" | "https") {
            return Err(FetchError::InvalidRedirect);
        }
        self.fetcher.check_host(&next)?;

        tracing::debug!(
            hop,
            status = raw.status.as_u16(),
            from = %raw.url,
            to = %next,
            "following redirect"
        );
        self.url = next;
        self.method = Method::GET;
        self.headers = OrderedHeaderMap::new();
        self.payload = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_chain_bound() {
        let mut chain = RedirectChain::new(200);
        for expected in 1..=200 {
            assert_eq!(chain.follow().unwrap(), expected);
        }
        assert_eq!(chain.follow().unwrap_err(), FetchError::TooManyRedirects { limit: 200 });
        assert_eq!(chain.hops(), 200);
    }

    #[test]
    fn test_zero_limit_rejects_first_redirect() {
        let mut chain = RedirectChain::new(0);
        assert!(chain.follow().is_err());
    }

    #[test]
    fn test_new_job_picks_method_and_timeout() {
        let fetcher = Fetcher::builder().host("example.test").build().unwrap();
        let url = fetcher.resolve_url("/login").unwrap();

        let job = FetchJob::new(&fetcher, url.clone(), FetchOptions::new()).unwrap();
        assert_eq!(job.method, Method::GET);
        assert_eq!(job.timeout, Duration::from_secs(10));
        assert_eq!(job.load_state(), LoadState::Idle);

        let opts = FetchOptions::new().payload("x").timeout(Duration::from_secs(2));
        let job = FetchJob::new(&fetcher, url.clone(), opts).unwrap();
        assert_eq!(job.method, Method::POST);
        assert_eq!(job.timeout, Duration::from_secs(2));

        let bad = FetchOptions::new().header("bad name", "x");
        assert_eq!(FetchJob::new(&fetcher, url, bad).err(), Some(FetchError::InvalidHeader));
    }

    #[test]
    fn test_build_request_merges_headers() {
        let fetcher = Fetcher::builder()
            .host("example.test")
            .header("X-Default", "a")
            .header("Accept", "*/*")
            .build()
            .unwrap();
        let url = fetcher.resolve_url("/").unwrap();
        let opts = FetchOptions::new().header("x-default", "b").header("X-Call", "c");
        let mut job = FetchJob::new(&fetcher, url, opts).unwrap();

        let request = job.build_request();
        let names: Vec<_> = request.headers.iter().map(|(k, _)| k.as_str().to_string()).collect();
        assert_eq!(names, ["accept-encoding", "x-default", "accept", "x-call"]);
        assert_eq!(request.headers.get_str("X-Default"), Some("b"));
    }
}
