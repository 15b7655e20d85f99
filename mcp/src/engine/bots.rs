use polars::prelude::*;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

use super::table::{COL_USER_AGENT, LogTable};

/// User-agent fragments identifying crawlers, monitors and HTTP libraries
pub const BOT_SIGNATURES: &[&str] = &[
    "googlebot",
    "bingbot",
    "slurp",
    "duckduckbot",
    "baiduspider",
    "yandexbot",
    "facebookexternalhit",
    "twitterbot",
    "linkedinbot",
    "whatsapp",
    "telegram",
    "crawler",
    "spider",
    "scraper",
    "bot",
    "crawl",
    "fetch",
    "monitor",
    "check",
    "test",
    "pingdom",
    "uptime",
    "robot",
    "wget",
    "curl",
    "python-requests",
    "scrapy",
    "selenium",
    "phantomjs",
    "headless",
    "apache-httpclient",
    "java/",
    "go-http-client",
];

static BOT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = BOT_SIGNATURES
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&alternation)
        .case_insensitive(true)
        .build()
        .expect("bot signature pattern is valid")
});

/// Case-insensitive signature match; a missing or `"-"` agent is never a bot
pub fn is_bot(user_agent: Option<&str>) -> bool {
    match user_agent {
        None | Some("") | Some("-") => false,
        Some(agent) => BOT_PATTERN.is_match(agent),
    }
}

/// Drop bot rows when `exclude` is set
///
/// Returns the surviving rows and how many were removed. With `exclude`
/// false the table comes back as is and the count is 0.
pub fn filter_bots(table: &LogTable, exclude: bool) -> PolarsResult<(LogTable, usize)> {
    if !exclude || !table.has_column(COL_USER_AGENT) {
        return Ok((table.clone(), 0));
    }

    let agents = table.string_values(COL_USER_AGENT)?;
    let flags: Vec<bool> = agents.iter().map(|a| is_bot(a.as_deref())).collect();
    let removed = flags.iter().filter(|&&bot| bot).count();
    let keep: BooleanChunked = flags.into_iter().map(|bot| !bot).collect();
    let filtered = table.filter(&keep)?;

    tracing::info!(removed, remaining = filtered.height(), "filtered bot traffic");
    Ok((filtered, removed))
}
