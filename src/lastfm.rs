//! # Last.fm Client
//!
//! Thin HTTP collaborator for tag and similar-track lookup. Every failure
//! mode (transport error, HTTP status, unexpected JSON shape) is converted
//! into an empty result and logged; the pipeline never sees an error from
//! this module.

use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;

use crate::seed::SimilarSource;
use crate::tag_cache::TagSource;

const API_ROOT: &str = "https://ws.audioscrobbler.com/2.0/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct LastfmClient {
    api_key: String,
    agent: ureq::Agent,
}

impl LastfmClient {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self { api_key, agent }
    }

    fn get(&self, url: &str) -> Option<Value> {
        match self.agent.get(url).call() {
            Ok(response) => match response.into_json::<Value>() {
                Ok(json) => Some(json),
                Err(err) => {
                    warn!("Last.fm returned unparseable JSON: {err}");
                    None
                }
            },
            Err(err) => {
                warn!("Last.fm request failed: {err}");
                None
            }
        }
    }
}

impl TagSource for LastfmClient {
    fn fetch_tags(&self, artist: &str, title: &str) -> Vec<String> {
        let url = format!(
            "{API_ROOT}?method=track.gettoptags&artist={}&track={}&api_key={}&format=json",
            urlencoding::encode(artist),
            urlencoding::encode(title),
            self.api_key,
        );
        debug!("Fetching tags for {artist} - {title}");

        let Some(json) = self.get(&url) else {
            return Vec::new();
        };
        let tags: Vec<String> = json
            .pointer("/toptags/tag")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.get("name").and_then(Value::as_str))
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        tags
    }
}

impl SimilarSource for LastfmClient {
    fn fetch_similar(&self, artist: &str, title: &str, limit: usize) -> Vec<(String, String)> {
        let url = format!(
            "{API_ROOT}?method=track.getsimilar&artist={}&track={}&api_key={}&format=json&limit={limit}",
            urlencoding::encode(artist),
            urlencoding::encode(title),
            self.api_key,
        );
        debug!("Fetching similar tracks for {artist} - {title}");

        let Some(json) = self.get(&url) else {
            return Vec::new();
        };
        json.pointer("/similartracks/track")
            .and_then(Value::as_array)
            .map(|tracks| {
                tracks
                    .iter()
                    .filter_map(|t| {
                        let artist = t.pointer("/artist/name").and_then(Value::as_str)?;
                        let name = t.get("name").and_then(Value::as_str)?;
                        Some((artist.to_string(), name.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
