use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Body returned by the remote-jobs endpoint. Only `jobs` matters to us; the
/// upstream also sends counters and a legal notice which are ignored.
///
/// Entries stay untyped until `Fetched::from` so one badly typed job cannot
/// fail the whole body.
#[derive(Debug, Default, Deserialize)]
pub struct JobsResponse {
    pub jobs: Option<Vec<Value>>,
}

/// A listing exactly as the upstream sends it. Every field is optional here;
/// `Listing::from_raw` decides what is acceptable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListing {
    pub id: Option<u64>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub company_logo: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub job_type: Option<String>,
    pub publication_date: Option<String>,
    pub candidate_required_location: Option<String>,
    pub salary: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub id: u64,
    pub title: String,
    pub company_name: String,
    pub company_logo: Option<String>,
    pub category: Option<String>,
    pub salary: Option<String>,
    pub published: Option<NaiveDateTime>,
    pub description: String,
    pub url: String,
    pub job_type: Option<String>,
    pub location: Option<String>,
    pub tags: Vec<String>,
}

/// Why a raw entry was dropped at the fetch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingId,
    MissingTitle,
    MissingUrl,
}

impl Listing {
    pub fn from_raw(raw: RawListing) -> Result<Self, Rejection> {
        let id = raw.id.ok_or(Rejection::MissingId)?;
        let title = non_blank(raw.title).ok_or(Rejection::MissingTitle)?;
        let url = non_blank(raw.url).ok_or(Rejection::MissingUrl)?;

        Ok(Self {
            id,
            title,
            url,
            company_name: non_blank(raw.company_name).unwrap_or_default(),
            company_logo: non_blank(raw.company_logo),
            category: non_blank(raw.category),
            salary: non_blank(raw.salary),
            published: raw.publication_date.as_deref().and_then(parse_timestamp),
            description: raw.description.unwrap_or_default(),
            job_type: non_blank(raw.job_type),
            location: non_blank(raw.candidate_required_location),
            tags: raw.tags.unwrap_or_default(),
        })
    }
}

/// Listings that survived validation, plus how many entries were dropped.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub listings: Vec<Listing>,
    pub rejected: usize,
}

impl From<JobsResponse> for Fetched {
    fn from(response: JobsResponse) -> Self {
        let mut fetched = Fetched::default();
        for entry in response.jobs.unwrap_or_default() {
            let raw: RawListing = match serde_json::from_value(entry) {
                Ok(raw) => raw,
                Err(error) => {
                    warn!(%error, "dropping undecodable listing");
                    fetched.rejected += 1;
                    continue;
                }
            };
            let raw_id = raw.id;
            match Listing::from_raw(raw) {
                Ok(listing) => fetched.listings.push(listing),
                Err(reason) => {
                    warn!(?raw_id, ?reason, "dropping malformed listing");
                    fetched.rejected += 1;
                }
            }
        }
        fetched
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Upstream timestamps come without an offset ("2024-05-10T13:12:05"), but
/// RFC 3339 is accepted too and reduced to its UTC wall clock.
pub fn parse_timestamp(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S"))
        .ok()
}
