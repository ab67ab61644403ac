//! Incremental harvest of one OAI-PMH target.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use stacks_core::config::OaiTargetConfig;
use stacks_core::error::{Result, StacksError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::client::OaiClient;
use crate::response::{inject_elements, OaiRecord, OaiResponse};

/// Per-target file holding the newest datestamp harvested.
pub const CHECKPOINT_FILE: &str = "last_harvest.txt";
const DAY_GRANULARITY: &str = "YYYY-MM-DD";
const AUTO_GRANULARITY: &str = "auto";
/// Returned by ListRecords when nothing changed since `from`.
const NO_RECORDS_MATCH: &str = "noRecordsMatch";

/// Outcome of one harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub records: usize,
    pub deleted: usize,
    /// Newest datestamp seen, formatted for the target's granularity.
    pub last_datestamp: Option<String>,
}

pub struct Harvester {
    name: String,
    target: OaiTargetConfig,
    client: OaiClient,
    dir: PathBuf,
    start_date: Option<String>,
    granularity: String,
    id_rewrites: Vec<(Regex, String)>,
    set_names: HashMap<String, String>,
    newest: Option<DateTime<Utc>>,
    /// Set once a record's datestamp is missing or unreadable; `newest` stops there.
    stamps_frozen: bool,
}

impl Harvester {
    /// Harvest `target` into `<base_dir>/<name>`.
    pub fn new(name: &str, target: &OaiTargetConfig, base_dir: &Path) -> Result<Self> {
        let client = OaiClient::new(target)?;
        Self::with_client(name, target, base_dir, client)
    }

    pub fn with_client(
        name: &str,
        target: &OaiTargetConfig,
        base_dir: &Path,
        client: OaiClient,
    ) -> Result<Self> {
        if target.id_search.len() != target.id_replace.len() {
            return Err(StacksError::Config(format!(
                "oai.{name}.id_search and oai.{name}.id_replace must have the same length"
            )));
        }
        let id_rewrites = target
            .id_search
            .iter()
            .zip(&target.id_replace)
            .map(|(pattern, replacement)| {
                Regex::new(pattern)
                    .map(|re| (re, replacement.clone()))
                    .map_err(|e| {
                        StacksError::Config(format!("oai.{name}.id_search {pattern:?}: {e}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            target: target.clone(),
            client,
            dir: base_dir.join(name),
            start_date: None,
            granularity: target.date_granularity.clone(),
            id_rewrites,
            set_names: HashMap::new(),
            newest: None,
            stamps_frozen: false,
        })
    }

    /// Harvest from `date` instead of the saved checkpoint.
    pub fn with_start_date(mut self, date: &str) -> Self {
        self.start_date = Some(date.to_string());
        self
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Granularity in effect; `auto` until `Identify` has been answered.
    pub fn granularity(&self) -> &str {
        &self.granularity
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    /// Run the harvest: every page of ListRecords since the checkpoint.
    pub async fn launch(&mut self) -> Result<HarvestSummary> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let from = match &self.start_date {
            Some(date) => Some(date.clone()),
            None => self.load_checkpoint().await?,
        };

        if self.granularity.eq_ignore_ascii_case(AUTO_GRANULARITY) {
            self.identify().await?;
        }
        if self.target.inject_set_name.is_some() {
            self.load_set_names().await?;
        }

        let mut params = vec![("metadataPrefix", self.target.metadata_prefix.clone())];
        if let Some(from) = &from {
            params.push(("from", from.clone()));
        }
        if let Some(set) = &self.target.set {
            params.push(("set", set.clone()));
        }

        info!(source = %self.name, from = ?from, "starting OAI-PMH harvest");
        let mut summary = HarvestSummary::default();
        self.newest = None;
        self.stamps_frozen = false;

        let mut page = match self.client.request("ListRecords", &params).await {
            Err(StacksError::Oai { code, .. }) if code == NO_RECORDS_MATCH => {
                info!(source = %self.name, "no new records");
                return Ok(summary);
            }
            other => other?,
        };
        loop {
            self.process_page(&page, &mut summary).await?;
            match page.resumption_token.take() {
                Some(token) => {
                    debug!(source = %self.name, token = %token, "following resumption token");
                    page = self
                        .client
                        .request("ListRecords", &[("resumptionToken", token)])
                        .await?;
                }
                None => break,
            }
        }

        summary.last_datestamp = self.save_checkpoint().await?;
        info!(
            source = %self.name,
            records = summary.records,
            deleted = summary.deleted,
            "OAI-PMH harvest complete"
        );
        Ok(summary)
    }

    async fn identify(&mut self) -> Result<()> {
        let response = self.client.request("Identify", &[]).await?;
        self.granularity = response
            .granularity
            .unwrap_or_else(|| DAY_GRANULARITY.to_string());
        debug!(source = %self.name, granularity = %self.granularity, "repository identified");
        Ok(())
    }

    async fn load_set_names(&mut self) -> Result<()> {
        let mut response = self.client.request("ListSets", &[]).await?;
        loop {
            for set in response.sets.drain(..) {
                self.set_names.insert(set.spec, set.name);
            }
            match response.resumption_token.take() {
                Some(token) => {
                    response = self
                        .client
                        .request("ListSets", &[("resumptionToken", token)])
                        .await?;
                }
                None => break,
            }
        }
        debug!(source = %self.name, sets = self.set_names.len(), "set names loaded");
        Ok(())
    }

    async fn load_checkpoint(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.checkpoint_path()).await {
            Ok(content) => Ok(Some(content.trim().to_string()).filter(|d| !d.is_empty())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the newest datestamp, unless the stored checkpoint is already later.
    async fn save_checkpoint(&self) -> Result<Option<String>> {
        let Some(newest) = self.newest else {
            return Ok(None);
        };
        let stamp = format_datestamp(newest, &self.granularity);
        let stored = self.load_checkpoint().await?;
        match stored.as_deref().and_then(parse_datestamp) {
            Some(previous) if previous >= newest => {
                debug!(
                    source = %self.name,
                    checkpoint = stored.as_deref().unwrap_or_default(),
                    newest = %stamp,
                    "checkpoint kept"
                );
            }
            _ => tokio::fs::write(self.checkpoint_path(), &stamp).await?,
        }
        Ok(Some(stamp))
    }

    async fn process_page(&mut self, page: &OaiResponse, summary: &mut HarvestSummary) -> Result<()> {
        let timestamp = Utc::now().timestamp();
        let mut harvested_ids = Vec::new();

        for record in &page.records {
            let id = self.normalize_id(&record.identifier);
            if id.is_empty() {
                return Err(StacksError::Harvest(format!(
                    "record {:?} has an empty identifier",
                    record.identifier
                )));
            }
            let file_stem = format!("{timestamp}_{}", file_safe(&id));

            if record.deleted {
                tokio::fs::write(self.dir.join(format!("{file_stem}.delete")), &id).await?;
                summary.deleted += 1;
            } else {
                let metadata = record.metadata.as_deref().ok_or_else(|| {
                    StacksError::Harvest(format!("record {id} has no metadata"))
                })?;
                let xml = self.inject(metadata, &id, record)?;
                tokio::fs::write(self.dir.join(format!("{file_stem}.xml")), xml).await?;
                harvested_ids.push(id);
                summary.records += 1;
            }

            if self.stamps_frozen {
                continue;
            }
            match record.datestamp.as_deref().and_then(parse_datestamp) {
                Some(stamp) => {
                    if self.newest.map_or(true, |newest| stamp > newest) {
                        self.newest = Some(stamp);
                    }
                }
                None => {
                    warn!(
                        source = %self.name,
                        identifier = %record.identifier,
                        datestamp = ?record.datestamp,
                        "unreadable datestamp, checkpoint will not advance past it"
                    );
                    self.stamps_frozen = true;
                }
            }
        }

        if let Some(log) = &self.target.harvested_id_log {
            if !harvested_ids.is_empty() {
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.dir.join(log))
                    .await?;
                for id in &harvested_ids {
                    file.write_all(format!("{id}\n").as_bytes()).await?;
                }
                file.flush().await?;
            }
        }

        debug!(source = %self.name, records = page.records.len(), "page processed");
        Ok(())
    }

    /// Strip the configured prefix, then apply each search/replace pair in order.
    pub fn normalize_id(&self, identifier: &str) -> String {
        let mut id = identifier.trim();
        if let Some(prefix) = self.target.id_prefix.as_deref().filter(|p| !p.is_empty()) {
            id = id.strip_prefix(prefix).unwrap_or(id);
        }
        self.id_rewrites
            .iter()
            .fold(id.to_string(), |id, (pattern, replacement)| {
                pattern.replace_all(&id, replacement.as_str()).into_owned()
            })
    }

    /// Insert the configured extra elements as the first children of the payload root.
    fn inject(&self, metadata: &str, id: &str, record: &OaiRecord) -> Result<String> {
        let mut extra = Vec::new();
        if let Some(tag) = &self.target.inject_id {
            extra.push((tag.clone(), id.to_string()));
        }
        if let Some(tag) = &self.target.inject_date {
            extra.push((tag.clone(), record.datestamp.clone().unwrap_or_default()));
        }
        if let Some(tag) = &self.target.inject_set_spec {
            for spec in &record.set_specs {
                extra.push((tag.clone(), spec.clone()));
            }
        }
        if let Some(tag) = &self.target.inject_set_name {
            for spec in &record.set_specs {
                if let Some(name) = self.set_names.get(spec) {
                    extra.push((tag.clone(), name.clone()));
                }
            }
        }
        inject_elements(metadata, &extra)
    }
}

/// Identifiers end up in file names; keep them to a portable character set.
fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn parse_datestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%SZ") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn format_datestamp(at: DateTime<Utc>, granularity: &str) -> String {
    if granularity == DAY_GRANULARITY {
        at.format("%Y-%m-%d").to_string()
    } else {
        at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECOND_GRANULARITY: &str = "YYYY-MM-DDThh:mm:ssZ";

    fn record_xml(id: &str, date: &str, sets: &[&str], title: &str) -> String {
        let specs: String = sets
            .iter()
            .map(|s| format!("<setSpec>{s}</setSpec>"))
            .collect();
        format!(
            r#"<record><header><identifier>{id}</identifier><datestamp>{date}</datestamp>{specs}</header><metadata><oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{title}</dc:title></oai_dc:dc></metadata></record>"#
        )
    }

    fn deleted_xml(id: &str, date: &str) -> String {
        format!(
            r#"<record><header status="deleted"><identifier>{id}</identifier><datestamp>{date}</datestamp></header></record>"#
        )
    }

    fn list_records(records: &[String], token: Option<&str>) -> String {
        let token = token
            .map(|t| format!("<resumptionToken>{t}</resumptionToken>"))
            .unwrap_or_default();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/"><ListRecords>{}{token}</ListRecords></OAI-PMH>"#,
            records.concat()
        )
    }

    fn xml_response(body: String) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(body)
    }

    fn target(server: &MockServer) -> OaiTargetConfig {
        let mut target = OaiTargetConfig::new(&format!("{}/oai", server.uri()));
        target.date_granularity = SECOND_GRANULARITY.to_string();
        target.retry_delay_secs = 0;
        target
    }

    fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().ends_with(suffix))
            .collect();
        files.sort();
        files
    }

    #[tokio::test]
    async fn follows_resumption_tokens_and_saves_checkpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("verb", "ListRecords"))
            .and(query_param("metadataPrefix", "oai_dc"))
            .respond_with(xml_response(list_records(
                &[record_xml("oai:repo:1", "2024-01-05T10:00:00Z", &[], "One")],
                Some("page-2"),
            )))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("verb", "ListRecords"))
            .and(query_param("resumptionToken", "page-2"))
            .respond_with(xml_response(list_records(
                &[record_xml("oai:repo:2", "2024-01-03T08:30:00Z", &[], "Two")],
                None,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let mut harvester = Harvester::new("repo", &target(&server), tmp.path()).unwrap();
        let summary = harvester.launch().await.unwrap();

        assert_eq!(summary.records, 2);
        assert_eq!(summary.last_datestamp.as_deref(), Some("2024-01-05T10:00:00Z"));
        let checkpoint = std::fs::read_to_string(harvester.checkpoint_path()).unwrap();
        assert_eq!(checkpoint, "2024-01-05T10:00:00Z");
        assert_eq!(files_with_suffix(harvester.directory(), ".xml").len(), 2);
    }

    #[tokio::test]
    async fn checkpoint_becomes_from_parameter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("verb", "ListRecords"))
            .and(query_param("from", "2024-01-05T10:00:00Z"))
            .respond_with(xml_response(list_records(&[], None)))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("repo")).unwrap();
        std::fs::write(
            tmp.path().join("repo").join(CHECKPOINT_FILE),
            "2024-01-05T10:00:00Z\n",
        )
        .unwrap();

        let mut harvester = Harvester::new("repo", &target(&server), tmp.path()).unwrap();
        let summary = harvester.launch().await.unwrap();
        assert_eq!(summary.records, 0);
        // nothing newer seen, previous checkpoint kept
        let checkpoint = std::fs::read_to_string(harvester.checkpoint_path()).unwrap();
        assert_eq!(checkpoint.trim(), "2024-01-05T10:00:00Z");
    }

    #[tokio::test]
    async fn forced_start_date_overrides_checkpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("from", "2023-06-01"))
            .respond_with(xml_response(list_records(&[], None)))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("repo")).unwrap();
        std::fs::write(tmp.path().join("repo").join(CHECKPOINT_FILE), "2024-01-05").unwrap();

        let mut harvester = Harvester::new("repo", &target(&server), tmp.path())
            .unwrap()
            .with_start_date("2023-06-01");
        harvester.launch().await.unwrap();
    }

    #[tokio::test]
    async fn older_start_date_keeps_later_checkpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("from", "2023-01-01"))
            .respond_with(xml_response(list_records(
                &[record_xml("oai:repo:1", "2023-02-01T00:00:00Z", &[], "Old")],
                None,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("repo")).unwrap();
        std::fs::write(
            tmp.path().join("repo").join(CHECKPOINT_FILE),
            "2024-06-01T00:00:00Z",
        )
        .unwrap();

        let mut harvester = Harvester::new("repo", &target(&server), tmp.path())
            .unwrap()
            .with_start_date("2023-01-01");
        let summary = harvester.launch().await.unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(summary.last_datestamp.as_deref(), Some("2023-02-01T00:00:00Z"));
        let checkpoint = std::fs::read_to_string(harvester.checkpoint_path()).unwrap();
        assert_eq!(checkpoint, "2024-06-01T00:00:00Z");
    }

    #[tokio::test]
    async fn unreadable_checkpoint_is_replaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(xml_response(list_records(
                &[record_xml("oai:repo:1", "2024-02-01T00:00:00Z", &[], "One")],
                None,
            )))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("repo")).unwrap();
        std::fs::write(tmp.path().join("repo").join(CHECKPOINT_FILE), "garbage").unwrap();

        let mut harvester = Harvester::new("repo", &target(&server), tmp.path())
            .unwrap()
            .with_start_date("2024-01-01");
        harvester.launch().await.unwrap();
        let checkpoint = std::fs::read_to_string(harvester.checkpoint_path()).unwrap();
        assert_eq!(checkpoint, "2024-02-01T00:00:00Z");
    }

    #[tokio::test]
    async fn unreadable_datestamp_stops_checkpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(xml_response(list_records(
                &[
                    record_xml("a", "not-a-date", &[], "A"),
                    record_xml("b", "2024-02-01T00:00:00Z", &[], "B"),
                ],
                None,
            )))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let mut harvester = Harvester::new("repo", &target(&server), tmp.path()).unwrap();
        let summary = harvester.launch().await.unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.last_datestamp, None);
        assert!(!harvester.checkpoint_path().exists());
    }

    #[tokio::test]
    async fn checkpoint_stops_at_last_readable_datestamp() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("verb", "ListRecords"))
            .and(query_param("metadataPrefix", "oai_dc"))
            .respond_with(xml_response(list_records(
                &[
                    record_xml("a", "2024-01-10T00:00:00Z", &[], "A"),
                    record_xml("b", "", &[], "B"),
                ],
                Some("page-2"),
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("resumptionToken", "page-2"))
            .respond_with(xml_response(list_records(
                &[record_xml("c", "2024-03-01T00:00:00Z", &[], "C")],
                None,
            )))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let mut harvester = Harvester::new("repo", &target(&server), tmp.path()).unwrap();
        let summary = harvester.launch().await.unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.last_datestamp.as_deref(), Some("2024-01-10T00:00:00Z"));
        let checkpoint = std::fs::read_to_string(harvester.checkpoint_path()).unwrap();
        assert_eq!(checkpoint, "2024-01-10T00:00:00Z");
    }

    #[tokio::test]
    async fn oai_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(xml_response(
                r#"<OAI-PMH><error code="badArgument">bad metadataPrefix</error></OAI-PMH>"#.to_string(),
            ))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let mut harvester = Harvester::new("repo", &target(&server), tmp.path()).unwrap();
        let err = harvester.launch().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "OAI-PMH error -- code: badArgument, value: bad metadataPrefix"
        );
        assert!(!harvester.checkpoint_path().exists());
    }

    #[tokio::test]
    async fn no_records_match_is_an_empty_harvest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(xml_response(
                r#"<OAI-PMH><error code="noRecordsMatch">No matching records</error></OAI-PMH>"#.to_string(),
            ))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let mut harvester = Harvester::new("repo", &target(&server), tmp.path()).unwrap();
        let summary = harvester.launch().await.unwrap();
        assert_eq!(summary, HarvestSummary::default());
    }

    #[tokio::test]
    async fn deleted_records_write_delete_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(xml_response(list_records(
                &[deleted_xml("oai:repo:9", "2024-02-01T00:00:00Z")],
                None,
            )))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let mut config = target(&server);
        config.id_prefix = Some("oai:repo:".into());
        config.harvested_id_log = Some("harvested.log".into());
        let mut harvester = Harvester::new("repo", &config, tmp.path()).unwrap();
        let summary = harvester.launch().await.unwrap();
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.records, 0);

        let deletes = files_with_suffix(harvester.directory(), ".delete");
        assert_eq!(deletes.len(), 1);
        assert!(deletes[0].to_string_lossy().ends_with("_9.delete"));
        assert_eq!(std::fs::read_to_string(&deletes[0]).unwrap(), "9");
        assert!(files_with_suffix(harvester.directory(), ".xml").is_empty());
        assert!(!harvester.directory().join("harvested.log").exists());
    }

    #[tokio::test]
    async fn injects_fields_and_logs_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("verb", "ListSets"))
            .respond_with(xml_response(
                r#"<OAI-PMH><ListSets><set><setSpec>theses</setSpec><setName>Theses &amp; Dissertations</setName></set></ListSets></OAI-PMH>"#.to_string(),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("verb", "ListRecords"))
            .respond_with(xml_response(list_records(
                &[record_xml("oai:repo:42", "2024-03-01T12:00:00Z", &["theses"], "Answer")],
                None,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let mut config = target(&server);
        config.id_prefix = Some("oai:repo:".into());
        config.id_search = vec![r"^(\d+)$".into()];
        config.id_replace = vec!["rec-$1".into()];
        config.inject_id = Some("identifier".into());
        config.inject_date = Some("harvest_date".into());
        config.inject_set_spec = Some("set_spec".into());
        config.inject_set_name = Some("set_name".into());
        config.harvested_id_log = Some("harvested.log".into());

        let mut harvester = Harvester::new("repo", &config, tmp.path()).unwrap();
        harvester.launch().await.unwrap();

        let files = files_with_suffix(harvester.directory(), ".xml");
        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().ends_with("_rec-42.xml"));
        let xml = std::fs::read_to_string(&files[0]).unwrap();
        assert!(xml.contains(
            "<identifier>rec-42</identifier><harvest_date>2024-03-01T12:00:00Z</harvest_date><set_spec>theses</set_spec><set_name>Theses &amp; Dissertations</set_name><dc:title>"
        ));

        let log = std::fs::read_to_string(harvester.directory().join("harvested.log")).unwrap();
        assert_eq!(log, "rec-42\n");
    }

    #[tokio::test]
    async fn injects_into_self_closing_root_after_comment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(xml_response(list_records(
                &[r#"<record><header><identifier>7</identifier><datestamp>2024-03-01T12:00:00Z</datestamp></header><metadata><!-- a > b --><rec note="x > y"/></metadata></record>"#.to_string()],
                None,
            )))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let mut config = target(&server);
        config.inject_id = Some("identifier".into());

        let mut harvester = Harvester::new("repo", &config, tmp.path()).unwrap();
        harvester.launch().await.unwrap();

        let files = files_with_suffix(harvester.directory(), ".xml");
        assert_eq!(files.len(), 1);
        let xml = std::fs::read_to_string(&files[0]).unwrap();
        assert_eq!(
            xml,
            r#"<!-- a > b --><rec note="x > y"><identifier>7</identifier></rec>"#
        );
    }

    #[tokio::test]
    async fn auto_granularity_uses_identify() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("verb", "Identify"))
            .respond_with(xml_response(
                "<OAI-PMH><Identify><granularity>YYYY-MM-DD</granularity></Identify></OAI-PMH>".to_string(),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("verb", "ListRecords"))
            .respond_with(xml_response(list_records(
                &[record_xml("oai:repo:1", "2024-04-09T23:59:59Z", &[], "One")],
                None,
            )))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let mut config = target(&server);
        config.date_granularity = AUTO_GRANULARITY.to_string();
        let mut harvester = Harvester::new("repo", &config, tmp.path()).unwrap();
        let summary = harvester.launch().await.unwrap();
        assert_eq!(harvester.granularity(), DAY_GRANULARITY);
        assert_eq!(summary.last_datestamp.as_deref(), Some("2024-04-09"));
    }

    #[tokio::test]
    async fn record_without_metadata_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(xml_response(list_records(
                &[r#"<record><header><identifier>x</identifier></header></record>"#.to_string()],
                None,
            )))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let mut harvester = Harvester::new("repo", &target(&server), tmp.path()).unwrap();
        let err = harvester.launch().await.unwrap_err();
        assert!(matches!(err, StacksError::Harvest(_)));
    }

    #[test]
    fn invalid_id_pattern_is_config_error() {
        let mut config = OaiTargetConfig::new("http://localhost/oai");
        config.id_search = vec!["(".into()];
        config.id_replace = vec!["x".into()];
        let err = Harvester::new("repo", &config, Path::new("/tmp")).err().unwrap();
        assert!(matches!(err, StacksError::Config(_)));
    }

    #[test]
    fn datestamp_formats() {
        let at = parse_datestamp("2024-01-02T03:04:05Z").unwrap();
        assert_eq!(format_datestamp(at, DAY_GRANULARITY), "2024-01-02");
        assert_eq!(format_datestamp(at, SECOND_GRANULARITY), "2024-01-02T03:04:05Z");
        let day = parse_datestamp("2024-01-02").unwrap();
        assert!(day < at);
        assert!(parse_datestamp("yesterday").is_none());
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(file_safe("oai:repo/1 2"), "oai_repo_1_2");
        assert_eq!(file_safe("rec-42.v1"), "rec-42.v1");
    }
}
