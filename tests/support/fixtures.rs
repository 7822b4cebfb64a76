//! Shared fixtures: synthetic identifiers, E-utilities payloads, a scripted
//! in-process API and a wiremock server that mimics esearch and efetch.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pubmed_export::client::{ApiError, LiteratureApi, SearchResult};
use pubmed_export::record::{Record, parse_record};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// `n` synthetic PMIDs in ascending order.
pub fn pmids(n: usize) -> Vec<String> {
    (1..=n).map(|i| (38_000_000 + i).to_string()).collect()
}

pub fn title_for(pmid: &str) -> String {
    format!("Study {pmid}")
}

pub fn abstract_for(pmid: &str) -> String {
    format!("Abstract of {pmid}.")
}

/// One `<PubmedArticle>` with optional title and abstract.
pub fn article_xml(pmid: &str, title: Option<&str>, abstract_text: Option<&str>) -> String {
    let title = title
        .map(|t| format!("<ArticleTitle>{t}</ArticleTitle>"))
        .unwrap_or_default();
    let abstract_el = abstract_text
        .map(|a| format!("<Abstract><AbstractText>{a}</AbstractText></Abstract>"))
        .unwrap_or_default();
    format!(
        "<PubmedArticle><MedlineCitation Status=\"MEDLINE\" Owner=\"NLM\">\
         <PMID Version=\"1\">{pmid}</PMID><Article>{title}{abstract_el}</Article>\
         </MedlineCitation><PubmedData/></PubmedArticle>"
    )
}

/// Complete article for `pmid` using [`title_for`] and [`abstract_for`].
pub fn full_article_xml(pmid: &str) -> String {
    article_xml(pmid, Some(&title_for(pmid)), Some(&abstract_for(pmid)))
}

/// Wraps articles in an efetch article set document.
pub fn article_set_xml(articles: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" ?>\n\
         <!DOCTYPE PubmedArticleSet PUBLIC \"-//NLM//DTD PubMedArticle, 1st January 2024//EN\" \
         \"https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_240101.dtd\">\n\
         <PubmedArticleSet>{}</PubmedArticleSet>",
        articles.concat()
    )
}

/// esearch JSON payload.
pub fn esearch_json(count: usize, ids: &[String]) -> String {
    serde_json::json!({
        "header": {"type": "esearch", "version": "0.3"},
        "esearchresult": {
            "count": count.to_string(),
            "retmax": ids.len().to_string(),
            "retstart": "0",
            "idlist": ids,
        }
    })
    .to_string()
}

pub fn full_record(pmid: &str) -> Record {
    parse_record(&full_article_xml(pmid)).unwrap()
}

/// In-process [`LiteratureApi`] over a fixed identifier set.
///
/// Batches whose first identifier is in `failing` always fail transiently;
/// everything else returns complete records.
pub struct StubApi {
    ids: Vec<String>,
    failing: HashSet<String>,
    search_error: Mutex<Option<ApiError>>,
    pub fetch_calls: AtomicUsize,
    pub fetched: Mutex<Vec<Vec<String>>>,
}

impl StubApi {
    pub fn new(ids: Vec<String>) -> Self {
        Self {
            ids,
            failing: HashSet::new(),
            search_error: Mutex::new(None),
            fetch_calls: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Makes every fetch of the batch starting at `first_id` fail transiently.
    pub fn failing_batch(mut self, first_id: &str) -> Self {
        self.failing.insert(first_id.to_string());
        self
    }

    /// Makes the next search call fail with `error`.
    pub fn search_fails(self, error: ApiError) -> Self {
        *self.search_error.lock().unwrap() = Some(error);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiteratureApi for StubApi {
    async fn search(&self, _query: &str, max_results: usize) -> Result<SearchResult, ApiError> {
        if let Some(error) = self.search_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(SearchResult {
            count: self.ids.len() as u64,
            ids: self.ids.iter().take(max_results).cloned().collect(),
        })
    }

    async fn fetch(&self, ids: &[String]) -> Result<Vec<Record>, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(ids.to_vec());
        if ids.first().is_some_and(|first| self.failing.contains(first)) {
            return Err(ApiError::transient_status("stub://efetch.fcgi", 503));
        }
        Ok(ids.iter().map(|id| full_record(id)).collect())
    }
}

/// wiremock responder for `efetch.fcgi`: returns an article set for the
/// requested `id` list, or 503 when the list starts with a failing id.
///
/// The list is read from the query string for GET and from the form body
/// for POST. Clones share one request counter.
#[derive(Clone)]
pub struct EfetchResponder {
    failing: Arc<HashSet<String>>,
    requests: Arc<AtomicUsize>,
}

impl EfetchResponder {
    pub fn new(failing: &[&str]) -> Self {
        Self {
            failing: Arc::new(failing.iter().map(ToString::to_string).collect()),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

/// The `id` parameter of an efetch request, split on commas.
pub fn requested_ids(request: &Request) -> Vec<String> {
    let from_query = request
        .url
        .query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned());
    let value = from_query.or_else(|| {
        url::form_urlencoded::parse(&request.body)
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned())
    });
    value
        .map(|list| list.split(',').map(ToString::to_string).collect())
        .unwrap_or_default()
}

impl Respond for EfetchResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let ids = requested_ids(request);

        if ids.first().is_some_and(|first| self.failing.contains(first)) {
            return ResponseTemplate::new(503).set_body_string("Service Unavailable");
        }

        let articles: Vec<String> = ids.iter().map(|id| full_article_xml(id)).collect();
        ResponseTemplate::new(200)
            .insert_header("Content-Type", "text/xml; charset=UTF-8")
            .set_body_string(article_set_xml(&articles))
    }
}

/// Mock E-utilities server whose esearch returns `found` and whose efetch
/// serves every batch except those starting with an id in `failing`.
pub async fn mock_eutils(found: &[String], failing: &[&str]) -> (MockServer, EfetchResponder) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(esearch_json(found.len(), found)),
        )
        .mount(&server)
        .await;

    let efetch = EfetchResponder::new(failing);
    Mock::given(path("/efetch.fcgi"))
        .respond_with(efetch.clone())
        .mount(&server)
        .await;
    (server, efetch)
}
