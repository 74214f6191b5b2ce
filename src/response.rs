//! Reading back what the server says it received.
//!
//! The result page has no fixed structure, so extraction is heuristic and
//! never fails: an empty [`SubmissionData`] means nothing was recoverable.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::driver::{By, Driver, Following};

lazy_static::lazy_static! {
    static ref QUOTED_PAIR: Regex = Regex::new(r#""([^"]+)"\s*:\s*"([^"]*)""#).unwrap();
}

/// Heading levels that may introduce the echoed payload
const HEADING_SELECTOR: &str = "h1, h2, h3, h4";

/// Elements that may carry the payload right after the heading
const PAYLOAD_SELECTOR: &str = "pre, code, table, dl, div, p";

/// Submitted values keyed by field label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SubmissionData(BTreeMap<String, String>);

impl SubmissionData {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keep existing keys, add the ones `other` knows about
    fn fill_from(&mut self, pairs: Vec<(String, String)>) {
        for (key, value) in pairs {
            self.0.entry(key).or_insert(value);
        }
    }
}

impl FromIterator<(String, String)> for SubmissionData {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub struct ResponseInterpreter<'a, D: Driver> {
    driver: &'a D,
    heading: &'a str,
    expected_keys: &'a [String],
    settle_delay: Duration,
}

impl<'a, D: Driver> ResponseInterpreter<'a, D> {
    pub fn new(
        driver: &'a D,
        heading: &'a str,
        expected_keys: &'a [String],
        settle_delay: Duration,
    ) -> Self {
        Self {
            driver,
            heading,
            expected_keys,
            settle_delay,
        }
    }

    /// Two-stage extraction: the block after the submission heading, then
    /// quoted pairs anywhere in the page source for keys still missing.
    pub async fn extract_submission_data(&self) -> SubmissionData {
        sleep(self.settle_delay).await;

        let mut data = SubmissionData::default();
        if let Some(text) = self.payload_text().await {
            let pairs = parse_payload_text(&text);
            if let Some(key) = conflicting_key(&pairs) {
                warn!("Submission block reports several values for '{}'", key);
                return SubmissionData::default();
            }
            data.fill_from(pairs);
            debug!("Recovered {} pair(s) after the submission heading", data.len());
        }

        match self.driver.page_source().await {
            Ok(source) => {
                let pairs = scan_source(&source, self.expected_keys);
                if let Some(key) = conflicting_key(&pairs) {
                    warn!("Page carries several payloads disagreeing on '{}'", key);
                    return SubmissionData::default();
                }
                data.fill_from(pairs);
            }
            Err(e) => debug!("Could not read page source: {}", e),
        }
        data
    }

    /// True only when the submission heading is present AND the page carries
    /// a recognizable payload.
    pub async fn is_submission_confirmed(&self) -> bool {
        sleep(self.settle_delay).await;

        if self.find_heading().await.is_none() {
            debug!("No '{}' heading on the page", self.heading);
            return false;
        }
        let Ok(source) = self.driver.page_source().await else {
            return false;
        };
        let pairs = quoted_pairs(&unescape_html(&source));
        let relevant = scan_source(&source, self.expected_keys);
        if let Some(key) = conflicting_key(&relevant) {
            debug!("Ambiguous payload, '{}' has several values", key);
            return false;
        }
        let has_expected = pairs
            .iter()
            .any(|(k, _)| self.expected_keys.iter().any(|e| e == k));
        has_expected || pairs.len() >= 2
    }

    async fn find_heading(&self) -> Option<D::Element> {
        let wanted = self.heading.to_lowercase();
        let headings = self
            .driver
            .find_all(&By::Css(HEADING_SELECTOR.to_string()))
            .await
            .ok()?;
        for heading in headings {
            if let Ok(text) = self.driver.text(&heading).await
                && text.to_lowercase().contains(&wanted)
            {
                return Some(heading);
            }
        }
        None
    }

    async fn payload_text(&self) -> Option<String> {
        let heading = self.find_heading().await?;
        let block = self
            .driver
            .following(&heading, &Following::Matching(PAYLOAD_SELECTOR.to_string()))
            .await
            .ok()??;
        self.driver.text(&block).await.ok()
    }
}

/// `key: value` lines or an embedded JSON object
pub fn parse_payload_text(text: &str) -> Vec<(String, String)> {
    if let Some(pairs) = parse_json_object(text) {
        return pairs;
    }

    text.lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim().trim_matches('"').trim();
            let value = value.trim().trim_end_matches(',').trim().trim_matches('"');
            (!key.is_empty() && !key.contains('{')).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}

fn parse_json_object(text: &str) -> Option<Vec<(String, String)>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let Value::Object(map) = serde_json::from_str::<Value>(&text[start..=end]).ok()? else {
        return None;
    };
    Some(
        map.into_iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k, value)
            })
            .collect(),
    )
}

/// Quoted pairs in the source, narrowed to expected keys when any match
pub fn scan_source(source: &str, expected_keys: &[String]) -> Vec<(String, String)> {
    let pairs = quoted_pairs(&unescape_html(source));
    let relevant: Vec<(String, String)> = pairs
        .iter()
        .filter(|(k, _)| expected_keys.iter().any(|e| e == k))
        .cloned()
        .collect();
    if relevant.is_empty() { pairs } else { relevant }
}

/// First key that appears with two different values
fn conflicting_key(pairs: &[(String, String)]) -> Option<&str> {
    let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
    for (key, value) in pairs {
        match seen.insert(key.as_str(), value.as_str()) {
            Some(previous) if previous != value.as_str() => return Some(key.as_str()),
            _ => {}
        }
    }
    None
}

fn quoted_pairs(text: &str) -> Vec<(String, String)> {
    QUOTED_PAIR
        .captures_iter(text)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

fn unescape_html(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
#[path = "response_test.rs"]
mod response_test;
