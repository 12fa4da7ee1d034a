use matchday_lib::{location::{LocationObservation, TIMESTAMP_FORMAT}, traffic::TrafficRequest};
use serde::Serialize;

pub const SYSTEM_INSTRUCTION: &str = "You are a transit-advice expert who helps football supporters travel to and from the stadium on match day. \
Give practical, concrete advice based on the positions, the kick-off time and the recent reports you are given.";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// System instruction followed by the rendered request as the user turn.
pub fn build_messages(request: &TrafficRequest, historical: &[LocationObservation]) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: Role::System,
            content: SYSTEM_INSTRUCTION.to_string(),
        },
        ChatMessage {
            role: Role::User,
            content: render_request(request, historical),
        },
    ]
}

pub fn render_request(request: &TrafficRequest, historical: &[LocationObservation]) -> String {
    let reports = if historical.is_empty() {
        "- No recent reports are available.\n".to_string()
    } else {
        historical.iter().map(report_line).collect()
    };

    format!(
        "A supporter needs travel advice for today's match.\n\
        \n\
        Current position: latitude {}, longitude {}\n\
        Destination: latitude {}, longitude {}\n\
        Kick-off: {}\n\
        Favorite club: {}\n\
        \n\
        Recent location reports from supporters:\n\
        {reports}\
        \n\
        Answer in exactly four paragraphs separated by one blank line, in this order:\n\
        1. The recommended route.\n\
        2. The estimated travel time.\n\
        3. The expected crowd level.\n\
        4. Any additional tips.\n\
        Do not add headings or any other text.",
        request.current_latitude,
        request.current_longitude,
        request.destination_latitude,
        request.destination_longitude,
        request.game_time,
        request.favorite_club,
    )
}

fn report_line(observation: &LocationObservation) -> String {
    format!(
        "- {} (accuracy {} m, club: {})\n",
        observation.timestamp.format(TIMESTAMP_FORMAT),
        observation.accuracy,
        observation.favorite_club,
    )
}

/// Some servers return the prompt ahead of the continuation. Only the continuation is advice.
pub fn strip_prompt_echo<'a>(output: &'a str, messages: &[ChatMessage]) -> &'a str {
    let mut text = output.trim_start();
    for message in messages {
        if let Some(rest) = text.strip_prefix(message.content.as_str()) {
            text = rest.trim_start();
        }
    }
    text.trim_end()
}
