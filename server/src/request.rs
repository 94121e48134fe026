use std::collections::HashMap;

use actix_web::HttpRequest;
use anyhow::{bail, Context, Result};
use log::debug;
use portal_misc::api::Query;
use url::form_urlencoded;

/// Parses the common list query from the request query string.
pub fn parse_query(req: &HttpRequest) -> Result<Query> {
    let query_string = req.query_string();

    let mut fields: HashMap<String, String> = form_urlencoded::parse(query_string.as_bytes())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    debug!(
        "- {} {}, fields: {:?}, peer: {:?}",
        req.method(),
        req.path(),
        fields,
        req.peer_addr(),
    );

    let mut query = Query::default();
    if let Some(page) = fields.remove("page") {
        query.page = page.parse().context("parse page")?;
    }
    if let Some(page_size) = fields.remove("page_size") {
        query.page_size = page_size.parse().context("parse page_size")?;
    }
    query.search = fields.remove("q");
    query.role_code = fields.remove("role_code");
    query.feature_id = fields.remove("feature_id");

    query.validate()?;
    Ok(query)
}

/// Extracts the caller address for session records. Falls back to an error
/// when the connection has no peer, which only happens in unit tests.
pub fn peer_address(req: &HttpRequest) -> Result<String> {
    match req.peer_addr() {
        Some(addr) => Ok(addr.ip().to_string()),
        None => bail!("request has no peer address"),
    }
}
