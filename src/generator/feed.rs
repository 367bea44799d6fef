//! RSS 2.0 feed rendering.

use crate::config::SiteConfig;
use crate::utils::date::DateTimeUtc;
use anyhow::{Result, anyhow};
use rss::{CategoryBuilder, ChannelBuilder, GuidBuilder, ItemBuilder, validation::Validate};

/// One feed entry, already filtered and ordered by the caller.
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub date: DateTimeUtc,
    pub tags: Vec<String>,
}

pub fn render(config: &SiteConfig, site_url: &str, items: &[FeedItem]) -> Result<String> {
    let site = &config.site;
    let limit = config.plugins.index.rss_limit;

    let items: Vec<rss::Item> = items.iter().map(to_rss_item).collect();
    let channel = ChannelBuilder::default()
        .title(site.title.clone())
        .link(site_url.to_string())
        .description(format!("Last {limit} notes on {}", site.title))
        .language(Some(site.locale.clone()))
        .generator(Some(format!("quire {}", env!("CARGO_PKG_VERSION"))))
        .items(items)
        .build();

    channel
        .validate()
        .map_err(|e| anyhow!("RSS validation failed: {e}"))?;
    Ok(channel.to_string())
}

fn to_rss_item(item: &FeedItem) -> rss::Item {
    let categories = item
        .tags
        .iter()
        .map(|tag| CategoryBuilder::default().name(tag.clone()).build())
        .collect::<Vec<_>>();

    ItemBuilder::default()
        .title(Some(item.title.clone()))
        .link(Some(item.link.clone()))
        .guid(Some(
            GuidBuilder::default()
                .permalink(true)
                .value(item.link.clone())
                .build(),
        ))
        .description(Some(item.description.clone()))
        .pub_date(Some(item.date.to_rfc2822()))
        .categories(categories)
        .build()
}
