//! Editor activation on the customer's page.
//!
//! The overlay only starts when the page URL carries the editor parameters
//! minted by the dashboard and the page embeds the marker script that names
//! the site and the API host.

use url::Url;

use crate::dom::Document;
use crate::types::EpochMillis;

pub const PARAM_EXPERIMENT: &str = "__navlens_editor";
pub const PARAM_VARIANT: &str = "__variant";
pub const PARAM_TIMESTAMP: &str = "__ts";
pub const PARAM_TOKEN: &str = "__token";
pub const PARAM_SIGNATURE: &str = "__sig";

const EDITOR_PARAMS: &[&str] = &[
    PARAM_EXPERIMENT,
    PARAM_VARIANT,
    PARAM_TIMESTAMP,
    PARAM_TOKEN,
    PARAM_SIGNATURE,
];

/// Selector for the embed script tag.
pub const MARKER_SELECTOR: &str = "script[data-site-id][data-api-host]";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationError {
    #[error("invalid page URL: {0}")]
    InvalidUrl(String),
    #[error("missing editor parameter {0}")]
    MissingParam(&'static str),
    #[error("editor timestamp is not a number")]
    InvalidTimestamp,
    #[error("editor marker script not found")]
    MarkerNotFound,
}

/// The editor parameters carried in the page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorLink {
    pub experiment_id: String,
    pub variant_id: String,
    pub timestamp: EpochMillis,
    pub token: String,
    pub signature: String,
}

impl EditorLink {
    /// Append the editor parameters to `page_url`, replacing stale ones.
    pub fn to_url(&self, page_url: &str) -> Result<String, ActivationError> {
        let mut url =
            Url::parse(page_url).map_err(|e| ActivationError::InvalidUrl(e.to_string()))?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !EDITOR_PARAMS.contains(&key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (key, value) in &kept {
                query.append_pair(key, value);
            }
            query
                .append_pair(PARAM_EXPERIMENT, &self.experiment_id)
                .append_pair(PARAM_VARIANT, &self.variant_id)
                .append_pair(PARAM_TIMESTAMP, &self.timestamp.to_string())
                .append_pair(PARAM_TOKEN, &self.token)
                .append_pair(PARAM_SIGNATURE, &self.signature);
        }
        Ok(url.into())
    }

    /// Parse the editor parameters from a page URL. All five are required.
    pub fn from_url(page_url: &str) -> Result<Self, ActivationError> {
        let url = Url::parse(page_url).map_err(|e| ActivationError::InvalidUrl(e.to_string()))?;
        let param = |name: &'static str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(ActivationError::MissingParam(name))
        };

        let experiment_id = param(PARAM_EXPERIMENT)?;
        let variant_id = param(PARAM_VARIANT)?;
        let timestamp = param(PARAM_TIMESTAMP)?
            .parse()
            .map_err(|_| ActivationError::InvalidTimestamp)?;
        let token = param(PARAM_TOKEN)?;
        let signature = param(PARAM_SIGNATURE)?;

        Ok(Self {
            experiment_id,
            variant_id,
            timestamp,
            token,
            signature,
        })
    }
}

/// Site identity exposed by the embed script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorMarker {
    pub site_id: String,
    pub api_host: String,
}

pub fn find_marker(doc: &Document) -> Result<EditorMarker, ActivationError> {
    let candidates = doc
        .query_selector_all(MARKER_SELECTOR)
        .map_err(|_| ActivationError::MarkerNotFound)?;
    candidates
        .into_iter()
        .find_map(|node| {
            let site_id = doc.attr(node, "data-site-id")?.trim();
            let api_host = doc.attr(node, "data-api-host")?.trim();
            (!site_id.is_empty() && !api_host.is_empty()).then(|| EditorMarker {
                site_id: site_id.to_string(),
                api_host: api_host.trim_end_matches('/').to_string(),
            })
        })
        .ok_or(ActivationError::MarkerNotFound)
}

/// Everything the overlay needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorActivation {
    pub link: EditorLink,
    pub marker: EditorMarker,
}

impl EditorActivation {
    /// Both the URL parameters and the marker script must be present.
    pub fn from_page(page_url: &str, doc: &Document) -> Result<Self, ActivationError> {
        let link = EditorLink::from_url(page_url)?;
        let marker = find_marker(doc)?;
        Ok(Self { link, marker })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn link() -> EditorLink {
        EditorLink {
            experiment_id: "exp-1".into(),
            variant_id: "var-1".into(),
            timestamp: 1_700_000_000_000,
            token: "AbC123".into(),
            signature: "0123456789abcdef".into(),
        }
    }

    const PAGE: &str = r#"<html><head><script src="https://cdn.navlens.io/t.js" data-site-id="site-1" data-api-host="https://api.navlens.io/"></script></head><body></body></html>"#;

    #[test]
    fn test_link_round_trips_through_url() {
        let url = link().to_url("https://shop.example.com/pricing?utm=x").unwrap();
        assert!(url.starts_with("https://shop.example.com/pricing?utm=x&__navlens_editor=exp-1"));
        assert_eq!(EditorLink::from_url(&url).unwrap(), link());
    }

    #[test]
    fn test_stale_editor_params_are_replaced() {
        let first = link().to_url("https://shop.example.com/").unwrap();
        let mut newer = link();
        newer.timestamp += 1;
        let second = newer.to_url(&first).unwrap();
        assert_eq!(second.matches(PARAM_TIMESTAMP).count(), 1);
        assert_eq!(EditorLink::from_url(&second).unwrap(), newer);
    }

    #[test]
    fn test_missing_and_invalid_params() {
        assert_matches!(
            EditorLink::from_url("https://shop.example.com/?__navlens_editor=e"),
            Err(ActivationError::MissingParam(PARAM_VARIANT))
        );
        assert_matches!(
            EditorLink::from_url(
                "https://x.io/?__navlens_editor=e&__variant=v&__ts=soon&__token=t&__sig=s"
            ),
            Err(ActivationError::InvalidTimestamp)
        );
        assert_matches!(
            EditorLink::from_url("not a url"),
            Err(ActivationError::InvalidUrl(_))
        );
    }

    #[test]
    fn test_marker_is_found() {
        let doc = Document::parse(PAGE);
        assert_eq!(
            find_marker(&doc).unwrap(),
            EditorMarker {
                site_id: "site-1".into(),
                api_host: "https://api.navlens.io".into(),
            }
        );
    }

    #[test]
    fn test_activation_requires_url_and_marker() {
        let url = link().to_url("https://shop.example.com/").unwrap();
        let with_marker = Document::parse(PAGE);
        let without_marker = Document::parse("<body><script src=x.js></script></body>");

        let activation = EditorActivation::from_page(&url, &with_marker).unwrap();
        assert_eq!(activation.link, link());
        assert_eq!(activation.marker.site_id, "site-1");

        assert_matches!(
            EditorActivation::from_page(&url, &without_marker),
            Err(ActivationError::MarkerNotFound)
        );
        assert_matches!(
            EditorActivation::from_page("https://shop.example.com/", &with_marker),
            Err(ActivationError::MissingParam(PARAM_EXPERIMENT))
        );
    }
}
