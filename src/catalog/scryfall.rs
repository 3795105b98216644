//! Scryfall API client
//!
//! Blocking facade over an async reqwest client. Consecutive requests from one
//! handle are spaced by at least the configured interval; forked handles keep
//! their own spacing.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use super::{sort_by_release, CardCatalog, CatalogError, PrintingRecord};
use crate::config::CatalogConfig;

/// Enforces a minimum gap between consecutive requests
#[derive(Debug)]
pub struct RequestSpacer {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RequestSpacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Block until the next request may be issued
    pub fn wait(&self) {
        let mut last = self.last.lock();
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

/// Paginated list response
#[derive(Debug, Deserialize)]
struct ListPage<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_page: Option<String>,
}

/// HTTP catalog backed by api.scryfall.com
pub struct ScryfallCatalog {
    client: reqwest::Client,
    runtime: Arc<Runtime>,
    base_url: String,
    spacer: RequestSpacer,
}

impl ScryfallCatalog {
    /// Create a client from catalog settings
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Http(format!("Failed to create HTTP client: {}", e)))?;

        info!("Using catalog at {}", config.base_url);

        Ok(Self {
            client,
            runtime: Arc::new(runtime),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            spacer: RequestSpacer::new(Duration::from_millis(config.min_request_interval_ms)),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET a URL and decode its JSON body
    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, CatalogError> {
        self.spacer.wait();
        debug!("GET {} {:?}", url, query);

        self.runtime.block_on(async {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(request_error)?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(CatalogError::NotFound(url.to_string()));
            }
            if !status.is_success() {
                return Err(CatalogError::Http(format!("{} returned {}", url, status)));
            }

            response
                .json::<T>()
                .await
                .map_err(|e| CatalogError::Decode(e.to_string()))
        })
    }

    /// Follow a paginated list to the end
    fn get_all_pages<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<T>, CatalogError> {
        let mut page: ListPage<T> = self.get_json(url, query)?;
        let mut items = std::mem::take(&mut page.data);

        while page.has_more {
            let Some(next) = page.next_page.take() else {
                break;
            };
            page = match self.get_json(&next, &[]) {
                Ok(page) => page,
                Err(e) => {
                    warn!("Stopping pagination after {} items: {}", items.len(), e);
                    break;
                }
            };
            items.append(&mut page.data);
        }

        Ok(items)
    }
}

fn request_error(e: reqwest::Error) -> CatalogError {
    if e.is_timeout() {
        CatalogError::Timeout(e.to_string())
    } else {
        CatalogError::Http(e.to_string())
    }
}

impl CardCatalog for ScryfallCatalog {
    fn named_fuzzy(&self, name: &str) -> Result<PrintingRecord, CatalogError> {
        self.get_json(&self.endpoint("/cards/named"), &[("fuzzy", name)])
    }

    fn printings_of(&self, card: &PrintingRecord) -> Result<Vec<PrintingRecord>, CatalogError> {
        let mut prints = if let Some(uri) = &card.prints_search_uri {
            self.get_all_pages(uri, &[])?
        } else if let Some(oracle_id) = &card.oracle_id {
            let query = format!("oracleid:{}", oracle_id);
            self.get_all_pages(
                &self.endpoint("/cards/search"),
                &[("q", query.as_str()), ("unique", "prints")],
            )?
        } else {
            vec![card.clone()]
        };

        sort_by_release(&mut prints);
        debug!("Found {} printings of '{}'", prints.len(), card.name);
        Ok(prints)
    }

    fn by_set_and_number(&self, set_code: &str, number: &str) -> Result<PrintingRecord, CatalogError> {
        let path = format!("/cards/{}/{}", set_code.to_lowercase(), number);
        self.get_json(&self.endpoint(&path), &[])
    }

    fn autocomplete(&self, partial: &str) -> Result<Vec<String>, CatalogError> {
        let page: ListPage<String> = self.get_json(&self.endpoint("/cards/autocomplete"), &[("q", partial)])?;
        Ok(page.data)
    }

    fn fetch_image(&self, reference: &str) -> Result<Vec<u8>, CatalogError> {
        self.spacer.wait();
        debug!("Fetching image {}", reference);

        self.runtime.block_on(async {
            let response = self.client.get(reference).send().await.map_err(request_error)?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(CatalogError::NotFound(reference.to_string()));
            }
            if !status.is_success() {
                return Err(CatalogError::Http(format!("{} returned {}", reference, status)));
            }

            let bytes = response.bytes().await.map_err(request_error)?;
            Ok(bytes.to_vec())
        })
    }

    fn fork(&self) -> Box<dyn CardCatalog> {
        Box::new(Self {
            client: self.client.clone(),
            runtime: Arc::clone(&self.runtime),
            base_url: self.base_url.clone(),
            spacer: RequestSpacer::new(self.spacer.interval),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spacer_enforces_interval() {
        let spacer = RequestSpacer::new(Duration::from_millis(40));
        let start = Instant::now();
        spacer.wait();
        spacer.wait();
        spacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn test_first_request_is_immediate() {
        let spacer = RequestSpacer::new(Duration::from_secs(5));
        let start = Instant::now();
        spacer.wait();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_endpoint_and_fork() {
        let config = CatalogConfig {
            base_url: "https://catalog.example/".to_string(),
            ..Default::default()
        };
        let catalog = ScryfallCatalog::new(&config).unwrap();
        assert_eq!(catalog.endpoint("/cards/named"), "https://catalog.example/cards/named");

        catalog.spacer.wait();
        let forked = catalog.fork();
        drop(forked);
        assert!(catalog.spacer.last.lock().is_some());
    }

    #[test]
    fn test_list_page_decoding() {
        let json = r#"{"object":"list","has_more":true,"next_page":"https://x/2","data":[
            {"name":"Sol Ring","set":"lea","collector_number":"270"}
        ]}"#;
        let page: ListPage<PrintingRecord> = serde_json::from_str(json).unwrap();
        assert!(page.has_more);
        assert_eq!(page.next_page.as_deref(), Some("https://x/2"));
        assert_eq!(page.data[0].collector_number, "270");

        let names: ListPage<String> = serde_json::from_str(r#"{"data":["Sol Ring","Sol Talisman"]}"#).unwrap();
        assert!(!names.has_more);
        assert_eq!(names.data.len(), 2);
    }
}
