use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TrafficRequest {
    pub current_latitude: f64,
    pub current_longitude: f64,
    pub destination_latitude: f64,
    pub destination_longitude: f64,
    /// Kick-off time as typed by the client. Never parsed.
    pub game_time: String,
    pub favorite_club: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct TrafficResponse {
    pub route_suggestion: String,
    pub estimated_time: String,
    pub crowd_level: String,
    pub additional_tips: String,
}

impl TrafficResponse {
    /// Assigns the paragraphs of the advice text to the four fields in order.
    /// Paragraphs past the fourth are dropped and missing ones stay empty.
    pub fn from_advice(text: &str) -> Self {
        let mut paragraphs = split_paragraphs(text).into_iter();

        Self {
            route_suggestion: paragraphs.next().unwrap_or_default(),
            estimated_time: paragraphs.next().unwrap_or_default(),
            crowd_level: paragraphs.next().unwrap_or_default(),
            additional_tips: paragraphs.next().unwrap_or_default(),
        }
    }
}

/// Splits text on runs of blank (whitespace only) lines.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n").trim().to_string());
                current.clear();
            }
        } else {
            current.push(line);
        }
    }

    if !current.is_empty() {
        paragraphs.push(current.join("\n").trim().to_string());
    }

    paragraphs
}
