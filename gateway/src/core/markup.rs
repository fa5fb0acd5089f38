//! TwiML voice markup rendering.
//!
//! [`VoiceResponse`] collects verbs and renders a complete `<Response>`
//! document. All text and attribute values are XML-escaped by the writer.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use thiserror::Error;

pub const CONTENT_TYPE: &str = "application/xml";

/// Served when even the apology document cannot be rendered
pub const STATIC_APOLOGY: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    "<Response><Say>Sorry, something went wrong. Please try again.</Say><Hangup/></Response>"
);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to render voice markup: {0}")]
pub struct MarkupError(pub String);

/// How a system utterance is delivered to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spoken {
    /// Text spoken by the telephony provider's own voice
    Say(String),
    /// URL of synthesized audio
    Play(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verb {
    Say(String),
    Play(String),
    Gather { action: String, prompt: Spoken },
    Redirect(String),
    Hangup,
}

/// Builder for a TwiML `<Response>` document
#[derive(Debug, Clone, Default)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
    language: Option<String>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Language attribute applied to `<Say>` and `<Gather>`
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    pub fn play(mut self, url: impl Into<String>) -> Self {
        self.verbs.push(Verb::Play(url.into()));
        self
    }

    pub fn speak(self, spoken: Spoken) -> Self {
        match spoken {
            Spoken::Say(text) => self.say(text),
            Spoken::Play(url) => self.play(url),
        }
    }

    /// Collect speech, posting the result to `action`.
    ///
    /// A `<Redirect>` to the same action follows so that silence re-enters the
    /// webhook with an empty utterance.
    pub fn gather(mut self, action: impl Into<String>, prompt: Spoken) -> Self {
        let action = action.into();
        self.verbs.push(Verb::Gather {
            action: action.clone(),
            prompt,
        });
        self.verbs.push(Verb::Redirect(action));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    /// Document for one turn: keep listening, or speak and hang up
    pub fn for_turn(self, spoken: Spoken, continue_call: bool, action: &str) -> Self {
        if continue_call {
            self.gather(action, spoken)
        } else {
            self.speak(spoken).hangup()
        }
    }

    pub fn render(&self) -> Result<String, MarkupError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        write(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        )?;
        write(&mut writer, Event::Start(BytesStart::new("Response")))?;
        for verb in &self.verbs {
            self.write_verb(&mut writer, verb)?;
        }
        write(&mut writer, Event::End(BytesEnd::new("Response")))?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| MarkupError(e.to_string()))
    }

    fn write_verb(
        &self,
        writer: &mut Writer<Cursor<Vec<u8>>>,
        verb: &Verb,
    ) -> Result<(), MarkupError> {
        match verb {
            Verb::Say(text) => self.write_say(writer, text),
            Verb::Play(url) => write_text_element(writer, BytesStart::new("Play"), url),
            Verb::Gather { action, prompt } => {
                let mut start = BytesStart::new("Gather");
                start.push_attribute(("input", "speech"));
                start.push_attribute(("action", action.as_str()));
                start.push_attribute(("method", "POST"));
                start.push_attribute(("speechTimeout", "auto"));
                if let Some(language) = &self.language {
                    start.push_attribute(("language", language.as_str()));
                }
                write(writer, Event::Start(start))?;
                match prompt {
                    Spoken::Say(text) => self.write_say(writer, text)?,
                    Spoken::Play(url) => {
                        write_text_element(writer, BytesStart::new("Play"), url)?
                    }
                }
                write(writer, Event::End(BytesEnd::new("Gather")))
            }
            Verb::Redirect(url) => {
                let mut start = BytesStart::new("Redirect");
                start.push_attribute(("method", "POST"));
                write_text_element(writer, start, url)
            }
            Verb::Hangup => write(writer, Event::Empty(BytesStart::new("Hangup"))),
        }
    }

    fn write_say(
        &self,
        writer: &mut Writer<Cursor<Vec<u8>>>,
        text: &str,
    ) -> Result<(), MarkupError> {
        let mut start = BytesStart::new("Say");
        if let Some(language) = &self.language {
            start.push_attribute(("language", language.as_str()));
        }
        write_text_element(writer, start, text)
    }
}

/// Apology document used when a webhook request cannot be processed
pub fn apology(text: &str, action: &str) -> String {
    VoiceResponse::new()
        .gather(action, Spoken::Say(text.to_string()))
        .render()
        .unwrap_or_else(|_| STATIC_APOLOGY.to_string())
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), MarkupError> {
    writer
        .write_event(event)
        .map_err(|e| MarkupError(e.to_string()))
}

fn write_text_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    start: BytesStart<'_>,
    text: &str,
) -> Result<(), MarkupError> {
    let end = start.to_end().into_owned();
    write(writer, Event::Start(start))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(end))
}
