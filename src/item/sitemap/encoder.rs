//! Stateless element encoding.
//!
//! Every function returns the exact bytes of one fragment. Nothing is
//! indented, so the length of a fragment is also its contribution to the
//! size of the file it ends up in.

use quick_xml::{
    Writer,
    escape::escape,
    events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event},
};

use crate::error::SitemapError;

use super::types::{
    IMAGE_NS, Img, IndexItem, LinkItem, NEWS_NS, Namespaces, NewsItem, SITEMAP_NS, SitemapItem,
    VIDEO_NS, VideoItem, XHTML_NS,
};

pub const URLSET_TAG: &str = "urlset";
pub const SITEMAPINDEX_TAG: &str = "sitemapindex";

type XmlWriter = Writer<Vec<u8>>;

fn encoding_error<E: std::fmt::Display>(e: E) -> SitemapError {
    SitemapError::Encoding(format!("Failed to write XML event: {}", e))
}

fn start(writer: &mut XmlWriter, tag: &str) -> Result<(), SitemapError> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(encoding_error)
}

fn end(writer: &mut XmlWriter, tag: &str) -> Result<(), SitemapError> {
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(encoding_error)
}

/// Writes `<tag>text</tag>` with `text` escaped.
fn leaf(writer: &mut XmlWriter, tag: &str, text: &str) -> Result<(), SitemapError> {
    start(writer, tag)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(encoding_error)?;
    end(writer, tag)
}

fn leaf_opt(writer: &mut XmlWriter, tag: &str, text: Option<&str>) -> Result<(), SitemapError> {
    match text {
        Some(text) => leaf(writer, tag, text),
        None => Ok(()),
    }
}

fn leaf_with_attrs(
    writer: &mut XmlWriter,
    tag: &str,
    attrs: &[(&str, &str)],
    text: &str,
) -> Result<(), SitemapError> {
    let mut element = BytesStart::new(tag);
    for attr in attrs {
        element.push_attribute(*attr);
    }
    writer
        .write_event(Event::Start(element))
        .map_err(encoding_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(encoding_error)?;
    end(writer, tag)
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Writes the XML declaration and the optional stylesheet instruction.
fn declaration(writer: &mut XmlWriter, xsl_url: Option<&str>) -> Result<(), SitemapError> {
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(encoding_error)?;
    if let Some(xsl_url) = xsl_url {
        let content = format!("xml-stylesheet type=\"text/xsl\" href=\"{}\"", escape(xsl_url));
        writer
            .write_event(Event::PI(BytesPI::new(content)))
            .map_err(encoding_error)?;
    }
    Ok(())
}

/// Document preamble of a url set: declaration, stylesheet, `<urlset ...>`.
pub fn urlset_preamble(
    xsl_url: Option<&str>,
    namespaces: &Namespaces,
) -> Result<Vec<u8>, SitemapError> {
    let mut writer = Writer::new(Vec::new());
    declaration(&mut writer, xsl_url)?;

    let mut root = BytesStart::new(URLSET_TAG);
    root.push_attribute(("xmlns", SITEMAP_NS));
    if namespaces.news {
        root.push_attribute(("xmlns:news", NEWS_NS));
    }
    if namespaces.xhtml {
        root.push_attribute(("xmlns:xhtml", XHTML_NS));
    }
    if namespaces.image {
        root.push_attribute(("xmlns:image", IMAGE_NS));
    }
    if namespaces.video {
        root.push_attribute(("xmlns:video", VIDEO_NS));
    }
    for (name, value) in &namespaces.custom {
        root.push_attribute((name.as_str(), value.as_str()));
    }
    writer
        .write_event(Event::Start(root))
        .map_err(encoding_error)?;

    Ok(writer.into_inner())
}

/// Document preamble of an index: declaration, stylesheet, `<sitemapindex ...>`.
pub fn index_preamble(xsl_url: Option<&str>) -> Result<Vec<u8>, SitemapError> {
    let mut writer = Writer::new(Vec::new());
    declaration(&mut writer, xsl_url)?;

    let mut root = BytesStart::new(SITEMAPINDEX_TAG);
    root.push_attribute(("xmlns", SITEMAP_NS));
    writer
        .write_event(Event::Start(root))
        .map_err(encoding_error)?;

    Ok(writer.into_inner())
}

/// Closing tag of a root element.
pub fn closing_tag(root: &str) -> Vec<u8> {
    format!("</{}>", root).into_bytes()
}

fn format_priority(priority: f32, full_precision: bool) -> String {
    if full_precision {
        priority.to_string()
    } else {
        format!("{:.1}", priority)
    }
}

fn link(writer: &mut XmlWriter, link: &LinkItem) -> Result<(), SitemapError> {
    let hreflang = link.hreflang.as_deref().unwrap_or(&link.lang);
    let mut element = BytesStart::new("xhtml:link");
    element.push_attribute(("rel", "alternate"));
    element.push_attribute(("hreflang", hreflang));
    element.push_attribute(("href", link.url.as_str()));
    writer
        .write_event(Event::Empty(element))
        .map_err(encoding_error)
}

fn image(writer: &mut XmlWriter, img: &Img) -> Result<(), SitemapError> {
    start(writer, "image:image")?;
    leaf(writer, "image:loc", &img.url)?;
    leaf_opt(writer, "image:caption", img.caption.as_deref())?;
    leaf_opt(writer, "image:title", img.title.as_deref())?;
    leaf_opt(writer, "image:geo_location", img.geo_location.as_deref())?;
    leaf_opt(writer, "image:license", img.license.as_deref())?;
    end(writer, "image:image")
}

fn video(writer: &mut XmlWriter, video: &VideoItem) -> Result<(), SitemapError> {
    start(writer, "video:video")?;
    leaf(writer, "video:thumbnail_loc", &video.thumbnail_loc)?;
    leaf(writer, "video:title", &video.title)?;
    leaf(writer, "video:description", &video.description)?;
    leaf_opt(writer, "video:content_loc", video.content_loc.as_deref())?;

    if let Some(player_loc) = &video.player_loc {
        let mut attrs = Vec::new();
        if let Some(allow_embed) = video.player_loc_allow_embed {
            attrs.push(("allow_embed", yes_no(allow_embed)));
        }
        if let Some(autoplay) = &video.player_loc_autoplay {
            attrs.push(("autoplay", autoplay.as_str()));
        }
        leaf_with_attrs(writer, "video:player_loc", &attrs, player_loc)?;
    }

    if let Some(duration) = video.duration {
        leaf(writer, "video:duration", &duration.to_string())?;
    }
    leaf_opt(writer, "video:expiration_date", video.expiration_date.as_deref())?;
    if let Some(rating) = video.rating {
        leaf(writer, "video:rating", &rating.to_string())?;
    }
    if let Some(view_count) = video.view_count {
        leaf(writer, "video:view_count", &view_count.to_string())?;
    }
    leaf_opt(writer, "video:publication_date", video.publication_date.as_deref())?;
    for tag in &video.tag {
        leaf(writer, "video:tag", tag)?;
    }
    leaf_opt(writer, "video:category", video.category.as_deref())?;
    if let Some(family_friendly) = video.family_friendly {
        leaf(writer, "video:family_friendly", yes_no(family_friendly))?;
    }
    if let Some(restriction) = &video.restriction {
        let relationship = video.restriction_relationship.as_deref().unwrap_or("allow");
        leaf_with_attrs(
            writer,
            "video:restriction",
            &[("relationship", relationship)],
            restriction,
        )?;
    }
    if let Some(requires_subscription) = video.requires_subscription {
        leaf(
            writer,
            "video:requires_subscription",
            yes_no(requires_subscription),
        )?;
    }
    leaf_opt(writer, "video:uploader", video.uploader.as_deref())?;
    if let Some(live) = video.live {
        leaf(writer, "video:live", yes_no(live))?;
    }
    end(writer, "video:video")
}

fn news(writer: &mut XmlWriter, news: &NewsItem) -> Result<(), SitemapError> {
    start(writer, "news:news")?;
    start(writer, "news:publication")?;
    leaf(writer, "news:name", &news.publication.name)?;
    leaf(writer, "news:language", &news.publication.language)?;
    end(writer, "news:publication")?;
    leaf_opt(writer, "news:access", news.access.as_deref())?;
    leaf_opt(writer, "news:genres", news.genres.as_deref())?;
    leaf(writer, "news:publication_date", &news.publication_date)?;
    leaf(writer, "news:title", &news.title)?;
    leaf_opt(writer, "news:keywords", news.keywords.as_deref())?;
    leaf_opt(writer, "news:stock_tickers", news.stock_tickers.as_deref())?;
    end(writer, "news:news")
}

/// Encodes one `<url>` element.
pub fn encode_url(item: &SitemapItem, full_precision_priority: bool) -> Result<Vec<u8>, SitemapError> {
    let mut writer = Writer::new(Vec::new());

    start(&mut writer, "url")?;
    leaf(&mut writer, "loc", &item.url)?;
    leaf_opt(&mut writer, "lastmod", item.lastmod.as_deref())?;
    leaf_opt(&mut writer, "changefreq", item.changefreq.as_deref())?;
    if let Some(priority) = item.priority {
        leaf(
            &mut writer,
            "priority",
            &format_priority(priority, full_precision_priority),
        )?;
    }
    for alternate in &item.links {
        link(&mut writer, alternate)?;
    }
    for img in &item.img {
        image(&mut writer, img)?;
    }
    for entry in &item.video {
        video(&mut writer, entry)?;
    }
    if let Some(entry) = &item.news {
        news(&mut writer, entry)?;
    }
    leaf_opt(&mut writer, "expires", item.expires.as_deref())?;
    end(&mut writer, "url")?;

    Ok(writer.into_inner())
}

/// Encodes one `<sitemap>` index entry.
pub fn encode_index_entry(entry: &IndexItem) -> Result<Vec<u8>, SitemapError> {
    let mut writer = Writer::new(Vec::new());

    start(&mut writer, "sitemap")?;
    leaf(&mut writer, "loc", &entry.url)?;
    leaf_opt(&mut writer, "lastmod", entry.lastmod.as_deref())?;
    end(&mut writer, "sitemap")?;

    Ok(writer.into_inner())
}
