//! Krisha-style HTML extraction
//!
//! Selector names follow the source's markup: the search subtitle carries
//! the ad count, ad cards sit in `section.a-search-list` tagged with
//! `data-id`, and the price-analysis document marks the below-market
//! percentage with `span.green-price`.

use crate::parse::{ListingFields, PageParser, ParseError, ParseResult, SearchMeta};
use scraper::{ElementRef, Html, Selector};

/// Page parser for krisha-style listing markup
pub struct KrishaParser {
    home_url: String,
}

impl KrishaParser {
    /// Creates a parser that resolves relative hrefs against `home_url`
    /// (scheme + host, no trailing slash)
    pub fn new(home_url: &str) -> Self {
        Self {
            home_url: home_url.trim_end_matches('/').to_string(),
        }
    }

    fn absolute(&self, href: &str) -> String {
        if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}{}", self.home_url, href)
        }
    }
}

/// Finds the first element matching a static CSS selector
fn select_first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector).next()
}

/// Collects the text content of an element, whitespace-trimmed
fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Keeps only the ASCII digits of a string
fn digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Extracts the room count from a detail page title
/// ("3-комнатная квартира, 78 м², ...")
fn rooms_from_title(title: &str) -> Option<u32> {
    let head = title.split("-комн").next()?;
    let tail: String = head
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    tail.chars().rev().collect::<String>().parse().ok()
}

/// Extracts the floor area from a detail page title (the number before "м²")
fn area_from_title(title: &str) -> Option<u32> {
    let head = title.split("м²").next()?;
    let number: String = head
        .trim_end()
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let number: String = number.chars().rev().collect::<String>().replace(',', ".");
    number.parse::<f64>().ok().map(|a| a as u32)
}

impl PageParser for KrishaParser {
    fn search_meta(&self, doc: &str, ads_per_page: u32) -> ParseResult<SearchMeta> {
        let doc = Html::parse_document(doc);
        let subtitle = select_first(&doc, "div.a-search-subtitle")
            .ok_or_else(|| ParseError::ElementNotFound("a-search-subtitle".to_string()))?;

        // "Найдено 1 945 объявлений" - digits only, thousands separators
        // included. No digits at all reads as an empty result set.
        let ad_count = digits(&element_text(subtitle)).parse().unwrap_or(0);
        Ok(SearchMeta::new(ad_count, ads_per_page))
    }

    fn listing_urls(&self, doc: &str) -> ParseResult<Vec<String>> {
        let doc = Html::parse_document(doc);
        let section = select_first(&doc, "section.a-search-list")
            .ok_or_else(|| ParseError::ElementNotFound("a-search-list".to_string()))?;

        let card_selector = Selector::parse("div[data-id]")
            .map_err(|_| ParseError::ElementNotFound("data-id".to_string()))?;
        let title_selector = Selector::parse("a.a-card__title")
            .map_err(|_| ParseError::ElementNotFound("a-card__title".to_string()))?;

        let mut urls = Vec::new();
        for card in section.select(&card_selector) {
            let anchor = card
                .select(&title_selector)
                .next()
                .ok_or_else(|| ParseError::ElementNotFound("a-card__title".to_string()))?;
            let href = anchor
                .value()
                .attr("href")
                .ok_or_else(|| ParseError::ElementNotFound("href".to_string()))?;
            urls.push(self.absolute(href));
        }

        if urls.is_empty() {
            return Err(ParseError::ElementNotFound("data-id".to_string()));
        }
        Ok(urls)
    }

    fn listing_fields(&self, doc: &str) -> ParseResult<ListingFields> {
        let doc = Html::parse_document(doc);
        let title_el = select_first(&doc, "div.offer__advert-title h1")
            .ok_or_else(|| ParseError::ElementNotFound("offer__advert-title".to_string()))?;
        let title = element_text(title_el);

        let address = select_first(&doc, "div.offer__location")
            .map(element_text)
            .filter(|s| !s.is_empty());
        // The location line leads with the city ("Алматы, Бостандыкский р-н, ...")
        let city = address
            .as_deref()
            .and_then(|a| a.split(',').next())
            .map(|c| c.trim().to_string());

        let map = select_first(&doc, "div#offer-map");
        let lat = map
            .and_then(|m| m.value().attr("data-lat"))
            .and_then(|v| v.parse().ok());
        let lon = map
            .and_then(|m| m.value().attr("data-lon"))
            .and_then(|v| v.parse().ok());

        let description = select_first(&doc, "div.offer__description div.text")
            .map(element_text)
            .filter(|s| !s.is_empty());

        let photo = select_first(&doc, "div.gallery__main img")
            .and_then(|img| img.value().attr("src"))
            .map(|s| s.to_string());

        Ok(ListingFields {
            rooms: rooms_from_title(&title),
            area: area_from_title(&title),
            city,
            lat,
            lon,
            description,
            photo,
            address,
            title,
        })
    }

    fn listing_price(&self, doc: &str) -> Option<i64> {
        let doc = Html::parse_document(doc);
        let price = select_first(&doc, "div.offer__price")?;
        let price = digits(&element_text(price));
        if price.is_empty() {
            return None;
        }
        price.parse().ok()
    }

    fn market_percent(&self, doc: &str) -> f64 {
        let doc = Html::parse_document(doc);
        let Some(block) = select_first(&doc, "div.text") else {
            return 0.0;
        };
        let Ok(selector) = Selector::parse("span.green-price") else {
            return 0.0;
        };
        let Some(tag) = block.select(&selector).next() else {
            return 0.0;
        };

        // "на 12.5% ниже" - take the token carrying the percent sign
        let text = element_text(tag);
        let Some(token) = text.split_whitespace().find(|t| t.contains('%')) else {
            return 0.0;
        };
        let number: String = token
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        number.parse().unwrap_or(0.0)
    }

    fn next_page_url(&self, doc: &str) -> ParseResult<String> {
        let doc = Html::parse_document(doc);
        let next = select_first(&doc, "a.paginator__btn--next")
            .ok_or_else(|| ParseError::ElementNotFound("paginator__btn--next".to_string()))?;
        let href = next
            .value()
            .attr("href")
            .ok_or_else(|| ParseError::ElementNotFound("href".to_string()))?;
        Ok(self.absolute(href))
    }
}
