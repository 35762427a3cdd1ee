//! End-to-end harvest runs against a mocked NCBI endpoint
//!
//! Search hits and detail fetches are served by wiremock; the store is a
//! real SQLite database in a temporary directory.

use std::time::Duration;

use pubmed_harvester::{
    ClientConfig, HarvestProfile, Harvester, PubMedClient, PubMedId, ReconciliationStore,
    RetryConfig, export_tables,
};
use serde_json::json;
use tracing_test::traced_test;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn esearch_body(ids: &[&str]) -> serde_json::Value {
    json!({
        "esearchresult": {
            "count": ids.len().to_string(),
            "retmax": ids.len().to_string(),
            "retstart": "0",
            "idlist": ids
        }
    })
}

fn article_xml(pmid: &str) -> String {
    format!(
        r#"<?xml version="1.0" ?>
<PubmedArticleSet>
<PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
        <PMID Version="1">{pmid}</PMID>
        <Article PubModel="Print">
            <Journal>
                <Title>Journal of school violence</Title>
            </Journal>
            <ArticleTitle>Article {pmid}</ArticleTitle>
            <Language>eng</Language>
        </Article>
    </MedlineCitation>
</PubmedArticle>
</PubmedArticleSet>"#
    )
}

/// EFetch responder that echoes the requested identifier into the document
fn efetch_responder(request: &Request) -> ResponseTemplate {
    let id = request
        .url
        .query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();

    ResponseTemplate::new(200)
        .set_body_string(article_xml(&id))
        .insert_header("content-type", "text/xml")
}

async fn mount_search(mock_server: &MockServer, query: &str, ids: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("term", query))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(ids)))
        .mount(mock_server)
        .await;
}

async fn mount_efetch(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(efetch_responder)
        .mount(mock_server)
        .await;
}

fn create_harvester(
    mock_server: &MockServer,
    store: ReconciliationStore,
    profile: HarvestProfile,
) -> Harvester {
    let config = ClientConfig::new()
        .with_base_url(mock_server.uri())
        .with_retry_config(RetryConfig::no_retry());

    Harvester::new(
        PubMedClient::with_config(config),
        store,
        profile.with_fetch_delay(Duration::ZERO),
    )
}

fn pmid(value: &str) -> PubMedId {
    PubMedId::parse(value).unwrap()
}

async fn efetch_request_count(mock_server: &MockServer) -> usize {
    mock_server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/efetch.fcgi")
        .count()
}

#[tokio::test]
#[traced_test]
async fn test_overlapping_terms_fetch_each_article_once() {
    let mock_server = MockServer::start().await;
    mount_search(&mock_server, "bullying[KYWD]", &["1", "2", "3"]).await;
    mount_search(&mock_server, "violence[KYWD]", &["2", "3", "4"]).await;
    mount_efetch(&mock_server).await;

    let store = ReconciliationStore::open_in_memory().unwrap();
    let mut harvester = create_harvester(&mock_server, store, HarvestProfile::production());

    let summary = harvester.run(["bullying", "violence"]).await.unwrap();

    assert_eq!(summary.terms.len(), 2);
    assert_eq!(summary.terms[0].pending, 3);
    assert_eq!(summary.terms[0].stored, 3);
    // 2 and 3 are already complete when "violence" runs
    assert_eq!(summary.terms[1].hits, 3);
    assert_eq!(summary.terms[1].new_hits, 3);
    assert_eq!(summary.terms[1].pending, 1);
    assert_eq!(summary.terms[1].stored, 1);

    let store = harvester.store();
    assert_eq!(store.hit_count().unwrap(), 6);
    assert_eq!(store.record_count().unwrap(), 4);
    assert_eq!(store.unique_article_count().unwrap(), 4);
    assert_eq!(efetch_request_count(&mock_server).await, 4);

    let record = store.get_record(pmid("4")).unwrap().unwrap();
    assert_eq!(record.article_title, "Article 4");
    assert_eq!(record.title, "Journal of school violence");

    let counts = store.all_search_term_counts().unwrap();
    assert_eq!(counts.get("bullying"), Some(&3));
    assert_eq!(counts.get("violence"), Some(&3));
}

#[tokio::test]
#[traced_test]
async fn test_second_run_is_a_no_op() {
    let mock_server = MockServer::start().await;
    mount_search(&mock_server, "bullying[KYWD]", &["10", "11"]).await;
    mount_efetch(&mock_server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("pubmed").join("pubmed.db");

    let store = ReconciliationStore::open(&db_path).unwrap();
    let mut harvester = create_harvester(&mock_server, store, HarvestProfile::production());
    let first = harvester.run(["bullying"]).await.unwrap();
    assert_eq!(first.stored(), 2);
    harvester.into_store().close().unwrap();

    let store = ReconciliationStore::open(&db_path).unwrap();
    let before = store.get_record(pmid("10")).unwrap();
    let mut harvester = create_harvester(&mock_server, store, HarvestProfile::production());
    let second = harvester.run(["bullying"]).await.unwrap();

    assert_eq!(second.new_hits(), 0);
    assert_eq!(second.stored(), 0);
    assert_eq!(second.terms[0].pending, 0);
    assert_eq!(harvester.store().hit_count().unwrap(), 2);
    assert_eq!(harvester.store().record_count().unwrap(), 2);
    assert_eq!(harvester.store().get_record(pmid("10")).unwrap(), before);
    assert_eq!(efetch_request_count(&mock_server).await, 2);
}

#[tokio::test]
#[traced_test]
async fn test_failed_fetch_stays_pending_until_next_run() {
    let mock_server = MockServer::start().await;
    mount_search(&mock_server, "bullying[KYWD]", &["1", "2", "3"]).await;
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .and(query_param("id", "2"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_efetch(&mock_server).await;

    let store = ReconciliationStore::open_in_memory().unwrap();
    let mut harvester = create_harvester(&mock_server, store, HarvestProfile::production());

    let first = harvester.run(["bullying"]).await.unwrap();
    assert_eq!(first.terms[0].stored, 2);
    assert_eq!(first.terms[0].failed, 1);
    assert!(logs_contain("Fetch failed, leaving identifier pending"));

    let pending = harvester.store().pending_identifiers("bullying").unwrap();
    assert_eq!(pending.into_iter().collect::<Vec<_>>(), vec![pmid("2")]);

    let second = harvester.run(["bullying"]).await.unwrap();
    assert_eq!(second.terms[0].pending, 1);
    assert_eq!(second.terms[0].stored, 1);
    assert_eq!(harvester.store().record_count().unwrap(), 3);
    assert!(
        harvester
            .store()
            .pending_identifiers("bullying")
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[traced_test]
async fn test_unparseable_document_is_stored_blank_and_not_refetched() {
    let mock_server = MockServer::start().await;
    mount_search(&mock_server, "bullying[KYWD]", &["5"]).await;
    Mock::given(method("GET"))
        .and(path("/efetch.fcgi"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<PubmedArticleSet><broken"))
        .mount(&mock_server)
        .await;

    let store = ReconciliationStore::open_in_memory().unwrap();
    let mut harvester = create_harvester(&mock_server, store, HarvestProfile::production());

    harvester.run(["bullying"]).await.unwrap();
    let record = harvester.store().get_record(pmid("5")).unwrap().unwrap();
    assert!(record.is_blank());

    let second = harvester.run(["bullying"]).await.unwrap();
    assert_eq!(second.terms[0].pending, 0);
    assert_eq!(efetch_request_count(&mock_server).await, 1);
}

#[tokio::test]
#[traced_test]
async fn test_search_failure_skips_only_that_term() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("term", "dating+violence[KYWD]"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    mount_search(&mock_server, "bullying[KYWD]", &["1"]).await;
    mount_efetch(&mock_server).await;

    let store = ReconciliationStore::open_in_memory().unwrap();
    let mut harvester = create_harvester(&mock_server, store, HarvestProfile::production());

    let summary = harvester.run(["dating violence", "bullying"]).await.unwrap();

    assert_eq!(summary.skipped_terms, vec!["dating violence"]);
    assert_eq!(summary.terms.len(), 1);
    assert_eq!(summary.terms[0].term, "bullying");
    assert_eq!(harvester.store().record_count().unwrap(), 1);
}

#[tokio::test]
#[traced_test]
async fn test_debug_profile_limits_terms_and_results() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("term", "bullying[KYWD]"))
        .and(query_param("retmax", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(&["1", "2"])))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/esearch.fcgi"))
        .and(query_param("term", "violence[KYWD]"))
        .respond_with(ResponseTemplate::new(200).set_body_json(esearch_body(&["3"])))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_efetch(&mock_server).await;

    let store = ReconciliationStore::open_in_memory().unwrap();
    let mut harvester = create_harvester(&mock_server, store, HarvestProfile::debug());

    let summary = harvester.run(["bullying", "violence"]).await.unwrap();

    assert_eq!(summary.terms.len(), 1);
    assert_eq!(summary.stored(), 2);
}

#[tokio::test]
#[traced_test]
async fn test_harvest_then_export() {
    let mock_server = MockServer::start().await;
    mount_search(&mock_server, "bullying[KYWD]", &["1", "2"]).await;
    mount_efetch(&mock_server).await;

    let store = ReconciliationStore::open_in_memory().unwrap();
    let mut harvester = create_harvester(&mock_server, store, HarvestProfile::production());
    harvester.run(["bullying"]).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let paths = export_tables(harvester.store(), dir.path()).unwrap();

    let hits = std::fs::read_to_string(&paths[0]).unwrap();
    assert_eq!(hits.lines().count(), 3);
    let articles = std::fs::read_to_string(&paths[1]).unwrap();
    assert!(articles.contains("Article 2"));
}
