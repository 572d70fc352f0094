use std::cmp::Reverse;

use crate::models::{LatLng, Review, ReviewId, SortMode};

/// One displayed entry in a list projection
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewCard {
    pub id: ReviewId,
    pub location: LatLng,
    pub text: String,
    pub photo_url: Option<String>,
    pub date: String,
    pub likes: u64,
    pub active: bool,
}

/// Everything the list views show for the current review set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub list: Vec<ReviewCard>,
    /// Present only while the mobile carousel is active
    pub carousel: Option<Vec<ReviewCard>>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Desktop sidebar markup
    pub fn to_html(&self) -> String {
        cards_html(&self.list, "review")
    }

    /// Carousel markup, empty when the carousel is inactive
    pub fn carousel_html(&self) -> String {
        self.carousel
            .as_deref()
            .map(|cards| cards_html(cards, "carousel-card"))
            .unwrap_or_default()
    }

    /// Plain-text listing for terminals
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for card in &self.list {
            out.push_str(&format!(
                "[{}] {}  ({:.5}, {:.5})  👍 {}\n",
                card.id, card.date, card.location.lat, card.location.lng, card.likes
            ));
            out.push_str(&format!("    {}\n", card.text));
            if let Some(url) = &card.photo_url {
                out.push_str(&format!("    photo: {}\n", url));
            }
        }
        out
    }
}

/// Order reviews for display
pub fn sort_reviews<'a>(reviews: impl IntoIterator<Item = &'a Review>, mode: SortMode) -> Vec<&'a Review> {
    let mut sorted: Vec<&Review> = reviews.into_iter().collect();
    match mode {
        SortMode::Newest => {
            sorted.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
        SortMode::MostLiked => {
            sorted.sort_by_key(|r| (Reverse(r.likes), Reverse(r.created_at), r.id.clone()));
        }
    }
    sorted
}

/// Build list cards; `resolve_photo` turns a blob path into a URL
pub fn cards<'a>(
    reviews: impl IntoIterator<Item = &'a Review>,
    mode: SortMode,
    active: Option<&ReviewId>,
    resolve_photo: impl Fn(&str) -> String,
) -> Vec<ReviewCard> {
    sort_reviews(reviews, mode)
        .into_iter()
        .map(|review| ReviewCard {
            id: review.id.clone(),
            location: review.location,
            text: review.text.clone(),
            photo_url: review.photo_path.as_deref().map(&resolve_photo),
            date: format_date(review),
            likes: review.likes,
            active: active == Some(&review.id),
        })
        .collect()
}

/// Popup content shown on a marker
pub fn preview_html(review: &Review, preview_chars: usize) -> String {
    let text = truncate(&review.text, preview_chars);
    format!(
        "<div class=\"review-preview\">\
         <p class=\"review-preview__text\">{}</p>\
         <div class=\"review-preview__meta\">\
         <span class=\"review-preview__date\">{}</span>\
         <span class=\"review-preview__likes\">👍 {}</span>\
         </div></div>",
        escape_html(&text),
        format_date(review),
        review.likes
    )
}

fn cards_html(cards: &[ReviewCard], class: &str) -> String {
    let mut html = String::new();

    for card in cards {
        let class_attr = if card.active {
            format!("{class} {class}--active")
        } else {
            class.to_string()
        };

        html.push_str(&format!(
            "<article class=\"{}\" data-id=\"{}\" data-lat=\"{}\" data-lng=\"{}\">\n",
            class_attr,
            escape_html(card.id.as_str()),
            card.location.lat,
            card.location.lng
        ));

        if let Some(url) = &card.photo_url {
            html.push_str(&format!(
                "  <img class=\"{}__photo\" src=\"{}\" alt=\"Review photo\" loading=\"lazy\">\n",
                class,
                escape_html(url)
            ));
        }

        html.push_str(&format!(
            "  <p class=\"{}__text\">{}</p>\n",
            class,
            escape_html(&card.text)
        ));
        html.push_str(&format!(
            "  <div class=\"{class}__meta\"><span class=\"{class}__date\">{}</span>\
             <span class=\"{class}__likes\">👍 {}</span></div>\n",
            card.date, card.likes
        ));
        html.push_str("</article>\n");
    }

    html
}

fn format_date(review: &Review) -> String {
    review.created_at.format("%Y-%m-%d").to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
